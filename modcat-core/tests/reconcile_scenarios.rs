//! End-to-end reconciliation passes

mod common;

use common::{add_author, day, echo_of, init_test_logging, published_catalog};
use modcat_core::catalog::{
    Author, Catalog, Compatibility, CompatibilityStatus, Exclusion, ExclusionCategory, Group, Mod,
    ModPatch, ModStatus,
};
use modcat_core::collect::{CollectedGroup, CollectedMod, CollectedSet};
use modcat_core::error::Violation;
use modcat_core::ids::{self, IdKind};
use modcat_core::reconcile::{reconcile, Entity, Section};
use modcat_core::ReconcileConfig;
use pretty_assertions::assert_eq;

fn run(catalog: &mut Catalog, set: &CollectedSet) -> modcat_core::ReconcileOutcome {
    reconcile(catalog, set, &ReconcileConfig::default(), day(2026, 10, 19))
}

#[test]
fn test_new_mod_into_empty_catalog() {
    init_test_logging();
    let mut catalog = Catalog::new();
    let mut set = CollectedSet::new();
    set.mods.push(CollectedMod::new(123, "Foo"));

    let outcome = run(&mut catalog, &set);

    assert!(!outcome.is_noop());
    assert_eq!(catalog.version(), 1);
    assert_eq!(catalog.update_timestamp(), day(2026, 10, 19));
    assert_eq!(catalog.mods().len(), 1);
    assert_eq!(catalog.mods()[0].id, 123);
    assert_eq!(catalog.mods()[0].name, "Foo");
    assert!(outcome.change_log().unwrap().contains("New mod 123 Foo"));

    // Same input again changes nothing
    let again = run(&mut catalog, &set);
    assert!(again.is_noop());
    assert_eq!(catalog.version(), 1);
}

#[test]
fn test_required_member_is_stored_as_group() {
    init_test_logging();
    let mut catalog = published_catalog(4, &[(10, "A"), (20, "B"), (2_000_001, "M")]);
    catalog.add_group(Group::new(5_000, "A or B", vec![10, 20])).unwrap();

    let mut set = echo_of(&catalog);
    set.mods[2].required_mods = vec![10];
    set.mods[2].details_checked = true;

    let outcome = run(&mut catalog, &set);

    assert!(!outcome.is_noop());
    assert_eq!(catalog.mod_by_id(2_000_001).unwrap().required_mods, vec![5_000]);
    assert_eq!(catalog.needed_for(5_000), vec![2_000_001]);
    assert_eq!(catalog.version(), 5);
}

#[test]
fn test_unreferenced_author_is_retired_once() {
    init_test_logging();
    let mut catalog = published_catalog(2, &[(2_000_001, "M")]);
    catalog.add_author(Author::new(1, "", "One")).unwrap();

    let echo = echo_of(&catalog);
    let outcome = run(&mut catalog, &echo);

    assert!(catalog.find_author(1, "").unwrap().retired);
    let log = outcome.change_log().unwrap();
    let removed = log.lines(Section::Removed);
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].entity, Entity::Author);
    assert_eq!(removed[0].text(), "Author One: retired");
}

#[test]
fn test_self_compatibility_is_rejected() {
    let mut catalog = published_catalog(1, &[(5, "Unlock All")]);
    let before = catalog.clone();

    let err = catalog
        .add_compatibility(Compatibility::new(
            5,
            5,
            CompatibilityStatus::MajorIssues,
            "",
        ))
        .unwrap_err();

    assert!(matches!(err, Violation::SelfPair { id: 5 }));
    assert_eq!(catalog, before);
}

#[test]
fn test_unchanged_input_is_a_noop() {
    init_test_logging();
    let mut catalog = published_catalog(9, &[(2_000_001, "M"), (2_000_002, "N")]);
    add_author(
        &mut catalog,
        Author::new(7, "someone", "Someone"),
        &[2_000_001, 2_000_002],
    );
    let before = catalog.clone();

    let echo = echo_of(&catalog);
    let outcome = run(&mut catalog, &echo);

    assert!(outcome.is_noop());
    assert!(outcome.change_log().is_none());
    assert_eq!(catalog, before);
    assert_eq!(catalog.update_timestamp(), day(2026, 1, 1));
}

#[test]
fn test_exclusions_block_automatic_changes() {
    init_test_logging();
    let mut catalog = published_catalog(3, &[(2_000_001, "M"), (2_000_002, "N")]);
    catalog
        .apply_patch(2_000_001, &ModPatch::new().source_url("https://a.example"))
        .unwrap();
    catalog
        .add_exclusion(Exclusion::new(2_000_001, ExclusionCategory::SourceUrl, None))
        .unwrap();
    catalog
        .add_exclusion(Exclusion::new(
            2_000_001,
            ExclusionCategory::RequiredMod,
            Some(2_000_002),
        ))
        .unwrap();

    let mut set = echo_of(&catalog);
    set.mods[0].details_checked = true;
    set.mods[0].source_url = "https://b.example".to_string();
    set.mods[0].required_mods = vec![2_000_002];

    let outcome = run(&mut catalog, &set);

    let m = catalog.mod_by_id(2_000_001).unwrap();
    assert_eq!(m.source_url, "https://a.example");
    assert!(m.required_mods.is_empty());
    assert!(outcome.is_noop());
    assert_eq!(catalog.version(), 3);
}

#[test]
fn test_dates_only_move_forward() {
    init_test_logging();
    let mut catalog = published_catalog(3, &[(2_000_001, "M")]);
    catalog
        .apply_patch(2_000_001, &ModPatch::new().updated(day(2026, 5, 1)))
        .unwrap();

    let mut set = echo_of(&catalog);
    set.mods[0].updated = Some(day(2026, 3, 1));
    assert!(run(&mut catalog, &set).is_noop());
    assert_eq!(
        catalog.mod_by_id(2_000_001).unwrap().updated,
        Some(day(2026, 5, 1))
    );

    set.mods[0].updated = Some(day(2026, 6, 1));
    let outcome = run(&mut catalog, &set);
    assert!(outcome.change_log().unwrap().contains("new update"));
    assert_eq!(
        catalog.mod_by_id(2_000_001).unwrap().updated,
        Some(day(2026, 6, 1))
    );
}

#[test]
fn test_absent_mods() {
    init_test_logging();
    let mut catalog = published_catalog(
        1,
        &[(2_000_001, "Kept"), (2_000_002, "Gone"), (2_000_003, "Hidden")],
    );
    catalog
        .apply_patch(
            2_000_003,
            &ModPatch::new().add_status(ModStatus::UnlistedInSource),
        )
        .unwrap();

    let mut set = CollectedSet::new();
    set.mods.push(CollectedMod::new(2_000_001, "Kept"));
    set.confirmed_removed.insert(2_000_002);

    let outcome = run(&mut catalog, &set);

    assert!(catalog
        .mod_by_id(2_000_002)
        .unwrap()
        .has_status(ModStatus::RemovedFromSource));
    assert!(!catalog
        .mod_by_id(2_000_003)
        .unwrap()
        .has_status(ModStatus::RemovedFromSource));
    assert!(outcome
        .change_log()
        .unwrap()
        .contains("Mod 2000002 Gone: removed from source"));

    // Coming back clears the flag
    set.mods.push(CollectedMod::new(2_000_002, "Gone"));
    let outcome = run(&mut catalog, &set);
    assert!(!catalog
        .mod_by_id(2_000_002)
        .unwrap()
        .has_status(ModStatus::RemovedFromSource));
    assert!(outcome.change_log().unwrap().contains("back in source"));
}

#[test]
fn test_unknown_required_ids_become_assets() {
    init_test_logging();
    let mut catalog = published_catalog(1, &[(2_000_001, "M")]);

    let mut set = echo_of(&catalog);
    set.mods[0].details_checked = true;
    set.mods[0].required_mods = vec![3_000_000];
    let outcome = run(&mut catalog, &set);

    assert!(catalog.is_required_asset(3_000_000));
    assert!(catalog.mod_by_id(2_000_001).unwrap().required_mods.is_empty());
    assert!(outcome
        .change_log()
        .unwrap()
        .contains("New required asset 3000000"));

    // The asset later shows up as a mod of its own
    set.mods.push(CollectedMod::new(3_000_000, "Was An Asset"));
    run(&mut catalog, &set);
    assert!(!catalog.is_required_asset(3_000_000));
    assert_eq!(
        catalog.mod_by_id(2_000_001).unwrap().required_mods,
        vec![3_000_000]
    );
}

#[test]
fn test_local_mods_keep_their_id() {
    init_test_logging();
    let mut catalog = published_catalog(1, &[]);
    let mut set = CollectedSet::new();
    set.mods.push(CollectedMod::local("My Local Tweak"));

    run(&mut catalog, &set);
    let id = catalog.mods()[0].id;
    assert_eq!(ids::classify(id), IdKind::Local);

    assert!(run(&mut catalog, &set).is_noop());
    assert_eq!(catalog.mods().len(), 1);
    assert_eq!(catalog.mods()[0].id, id);
}

#[test]
fn test_group_proposal_waits_for_new_members() {
    init_test_logging();
    let mut catalog = published_catalog(1, &[(2_000_001, "Old")]);

    let mut set = echo_of(&catalog);
    set.mods.push(CollectedMod::new(2_000_005, "New"));
    set.groups.push(CollectedGroup {
        name: "Old or New".to_string(),
        members: vec![2_000_001, 2_000_005],
    });

    let outcome = run(&mut catalog, &set);

    assert_eq!(catalog.groups().len(), 1);
    let group = catalog.group_of(2_000_005).unwrap();
    assert_eq!(ids::classify(group.id), IdKind::Group);
    assert!(outcome.change_log().unwrap().contains("New group"));

    // Same proposal again is recognised
    assert!(run(&mut catalog, &set).is_noop());
}

#[test]
fn test_collected_compatibilities() {
    init_test_logging();
    let mut catalog = published_catalog(1, &[(2_000_001, "A"), (2_000_002, "B")]);

    let mut set = echo_of(&catalog);
    set.compatibilities.push(Compatibility::new(
        2_000_001,
        2_000_002,
        CompatibilityStatus::MinorIssues,
        "flicker",
    ));
    run(&mut catalog, &set);
    assert_eq!(
        catalog.compatibility(2_000_001, 2_000_002).unwrap().note,
        "flicker"
    );

    // An empty note keeps the stored one
    set.compatibilities[0].status = CompatibilityStatus::MajorIssues;
    set.compatibilities[0].note = String::new();
    let outcome = run(&mut catalog, &set);
    let stored = catalog.compatibility(2_000_001, 2_000_002).unwrap();
    assert_eq!(stored.status, CompatibilityStatus::MajorIssues);
    assert_eq!(stored.note, "flicker");
    assert!(outcome.change_log().unwrap().contains("Compatibility 2000001 -> 2000002"));
}

#[test]
fn test_author_handles_survive_by_default() {
    init_test_logging();
    let mut catalog = published_catalog(1, &[(2_000_001, "M")]);
    add_author(&mut catalog, Author::new(7, "someone", "Someone"), &[2_000_001]);

    let mut set = echo_of(&catalog);
    set.mods[0].author_handle = String::new();
    set.mods[0].details_checked = true;

    assert!(run(&mut catalog, &set).is_noop());
    assert_eq!(catalog.mod_by_id(2_000_001).unwrap().author_handle, "someone");

    let config = ReconcileConfig {
        clear_missing_author_handles: true,
        ..ReconcileConfig::default()
    };
    reconcile(&mut catalog, &set, &config, day(2026, 10, 20));
    assert_eq!(catalog.mod_by_id(2_000_001).unwrap().author_handle, "");
}

#[test]
fn test_new_mod_carries_dated_note() {
    let mut catalog = published_catalog(1, &[]);
    let mut set = CollectedSet::new();
    set.mods.push(CollectedMod::new(2_000_010, "Fresh").with_details());

    run(&mut catalog, &set);

    let m: &Mod = catalog.mod_by_id(2_000_010).unwrap();
    assert_eq!(m.change_notes, vec!["2026-10-19: added".to_string()]);
    assert_eq!(m.auto_review_date, Some(day(2026, 10, 19)));
}

#[test]
fn test_exhausted_local_band_skips_only_that_record() {
    init_test_logging();
    let mut catalog = published_catalog(1, &[(ids::HIGHEST_LOCAL_ID, "Last Local")]);
    let mut set = echo_of(&catalog);
    set.mods.push(CollectedMod::local("Overflow"));
    set.mods.push(CollectedMod::new(2_000_010, "Real"));

    let outcome = run(&mut catalog, &set);

    assert!(!outcome.is_noop());
    assert_eq!(catalog.version(), 2);
    assert!(catalog.contains_mod(2_000_010));
    assert!(catalog.mods().iter().all(|m| m.name != "Overflow"));
    assert_eq!(catalog.mods().len(), 2);
}

#[test]
fn test_invalid_group_proposal_is_skipped() {
    init_test_logging();
    let mut catalog = published_catalog(
        1,
        &[(10, "A"), (20, "B"), (2_000_001, "M"), (2_000_002, "N")],
    );
    catalog.add_group(Group::new(5_000, "A or B", vec![10, 20])).unwrap();

    let mut set = echo_of(&catalog);
    set.mods[2].name = "M Renamed".to_string();
    set.groups.push(CollectedGroup {
        name: "Steals A".to_string(),
        members: vec![10, 2_000_001],
    });
    set.groups.push(CollectedGroup {
        name: "Nested".to_string(),
        members: vec![5_000, 2_000_002],
    });
    set.groups.push(CollectedGroup {
        name: "M or N".to_string(),
        members: vec![2_000_001, 2_000_002],
    });

    let outcome = run(&mut catalog, &set);

    assert!(!outcome.is_noop());
    assert_eq!(catalog.version(), 2);
    assert_eq!(catalog.mod_by_id(2_000_001).unwrap().name, "M Renamed");
    assert_eq!(catalog.groups().len(), 2);
    assert_eq!(catalog.group_of(10).unwrap().id, 5_000);
    // Rejected proposals leave no gap in the group band
    assert_eq!(catalog.group_of(2_000_002).unwrap().id, 5_001);
    assert_eq!(catalog.group(5_001).unwrap().name, "M or N");
}

#[test]
fn test_dependency_without_requirers_is_logged() {
    init_test_logging();
    let mut catalog = published_catalog(1, &[(2_000_001, "M"), (2_000_002, "D")]);
    catalog
        .apply_patch(2_000_001, &ModPatch::new().required_mods(vec![2_000_002]))
        .unwrap();
    assert_eq!(catalog.needed_for(2_000_002), vec![2_000_001]);

    let mut set = echo_of(&catalog);
    set.mods[0].details_checked = true;
    set.mods[0].required_mods = Vec::new();

    let outcome = run(&mut catalog, &set);

    assert!(catalog.mod_by_id(2_000_001).unwrap().required_mods.is_empty());
    assert!(catalog.needed_for(2_000_002).is_empty());
    let log = outcome.change_log().unwrap();
    assert!(log.contains("Mod 2000002 D: no longer required by any mod"), "{log:?}");
    assert_eq!(catalog.version(), 2);
}
