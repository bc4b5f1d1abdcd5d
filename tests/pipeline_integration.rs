//! Integration tests for full pipeline runs

mod support;

use support::{assert_journal_order, host_with_mods};

const MOD_A: &str = r#"
id = "a"
version = "1.0.0"

[[early_patch]]
id = "e"

[[main_patch]]
id = "m"
"#;

const MOD_B_DEP_A: &str = r#"
id = "b"
version = "1.0.0"

[[dependency]]
id = "a"

[[early_patch]]
id = "e"

[[main_patch]]
id = "m"
"#;

const MOD_C: &str = r#"
id = "c"
version = "1.0.0"

[[early_patch]]
id = "e"

[[main_patch]]
id = "m"
"#;

#[tokio::test]
async fn test_dependency_order_across_all_phases() {
    let setup = host_with_mods(&[MOD_B_DEP_A, MOD_A]);
    let report = setup.host.run_pipeline().await.unwrap();

    assert!(report.clean());
    let journal = setup.provider.journal();

    // loads precede runs per stage, dependencies precede dependents
    assert_eq!(
        journal,
        vec![
            "a/e:load", "b/e:load", "a/e:run", "b/e:run", "a/m:load", "b/m:load", "a/m:run",
            "b/m:run",
        ]
    );
}

#[tokio::test]
async fn test_missing_dependency_excludes_mod_but_not_others() {
    let broken = r#"
id = "b"

[[dependency]]
id = "ghost"

[[early_patch]]
id = "e"

[[main_patch]]
id = "m"
"#;
    let setup = host_with_mods(&[broken, MOD_C]);
    let report = setup.host.run_pipeline().await.unwrap();

    let journal = setup.provider.journal();
    assert!(journal.iter().all(|entry| !entry.starts_with("b/")));
    assert!(journal.contains(&"c/e:run".to_string()));
    assert!(journal.contains(&"c/m:run".to_string()));

    // skipped, but skips do not make the run unclean
    assert_eq!(report.skipped_mod_ids(), vec!["b"]);
    assert!(report.clean());

    // the mod stays registered for a later retry
    assert!(setup.host.is_registered("b").await);
}

#[tokio::test]
async fn test_cycle_excludes_exactly_the_cycle() {
    let ping = r#"
id = "ping"

[[dependency]]
id = "pong"

[[early_patch]]
id = "e"
"#;
    let pong = r#"
id = "pong"

[[dependency]]
id = "ping"

[[early_patch]]
id = "e"
"#;
    let setup = host_with_mods(&[ping, pong, MOD_C]);
    let report = setup.host.run_pipeline().await.unwrap();

    let journal = setup.provider.journal();
    assert!(journal.iter().all(|entry| !entry.starts_with("ping/")));
    assert!(journal.iter().all(|entry| !entry.starts_with("pong/")));
    assert!(journal.contains(&"c/e:run".to_string()));

    let skipped = report.skipped_mod_ids();
    assert!(skipped.contains(&"ping".to_string()));
    assert!(skipped.contains(&"pong".to_string()));
    assert!(!skipped.contains(&"c".to_string()));
}

#[tokio::test]
async fn test_integration_tier_phase_completes_before_regular() {
    let game_pack = r#"
id = "worldgen"
tier = "integration"

[[early_patch]]
id = "e"

[[main_patch]]
id = "m"
"#;
    let setup = host_with_mods(&[MOD_C, game_pack]);
    let report = setup.host.run_pipeline().await.unwrap();
    assert!(report.clean());

    let journal = setup.provider.journal();

    // the integration cohort's early phase (load AND run) finishes before
    // the regular cohort's early phase begins; likewise for main
    assert_journal_order(&journal, "worldgen/e:load", "c/e:load");
    assert_journal_order(&journal, "worldgen/e:run", "c/e:load");
    assert_journal_order(&journal, "worldgen/m:run", "c/m:load");

    // and every early step precedes every main step
    assert_journal_order(&journal, "c/e:run", "worldgen/m:load");
}

#[tokio::test]
async fn test_units_flatten_across_mods_in_cohort() {
    let base = r#"
id = "base"

[[early_patch]]
id = "first"
order = 1

[[early_patch]]
id = "late"
order = 50
"#;
    let addon = r#"
id = "addon"

[[dependency]]
id = "base"

[[early_patch]]
id = "hook"
order = 1
"#;
    let setup = host_with_mods(&[addon, base]);
    setup.host.run_pipeline().await.unwrap();

    let journal = setup.provider.journal();
    let runs: Vec<&String> = journal.iter().filter(|e| e.ends_with(":run")).collect();

    // the dependency's units all run first (its topological key dominates),
    // with intra-mod order respected
    assert_eq!(runs, vec!["base/first:run", "base/late:run", "addon/hook:run"]);
}

#[tokio::test]
async fn test_run_failure_is_isolated_to_the_unit() {
    let setup = host_with_mods(&[MOD_A, MOD_C]);
    setup.provider.fail_run("a/e");

    let report = setup.host.run_pipeline().await.unwrap();

    assert!(!report.clean());
    let failures: Vec<_> = report.unit_failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].mod_id, "a");
    assert_eq!(failures[0].step, "run");

    // the cohort kept running, including a's own main stage
    let journal = setup.provider.journal();
    assert!(journal.contains(&"c/e:run".to_string()));
    assert!(journal.contains(&"a/m:run".to_string()));
}

#[tokio::test]
async fn test_load_failure_excludes_stage_from_run() {
    let two_early = r#"
id = "a"

[[early_patch]]
id = "one"
order = 1

[[early_patch]]
id = "two"
order = 2

[[main_patch]]
id = "m"
"#;
    let setup = host_with_mods(&[two_early]);
    setup.provider.fail_load("a/one");

    let report = setup.host.run_pipeline().await.unwrap();

    assert!(!report.clean());
    let journal = setup.provider.journal();

    // nothing from the failed early stage ran, not even the healthy unit
    assert!(journal.iter().all(|e| !e.ends_with("one:run")));
    assert!(journal.iter().all(|e| !e.ends_with("two:run")));

    // the main stage is unaffected
    assert!(journal.contains(&"a/m:load".to_string()));
    assert!(journal.contains(&"a/m:run".to_string()));
}

#[tokio::test]
async fn test_subset_run_drives_only_named_mods() {
    let setup = host_with_mods(&[]);
    let late_mod = support::build_mod(MOD_C, setup.provider.as_ref());
    assert!(setup.host.add_mod(late_mod).await.unwrap());

    let report = setup
        .host
        .run_mods(vec!["c".to_string()])
        .await
        .unwrap();

    assert!(report.clean());
    assert_eq!(
        setup.provider.journal(),
        vec!["c/e:load", "c/e:run", "c/m:load", "c/m:run"]
    );
}

#[tokio::test]
async fn test_second_pipeline_run_does_not_reapply_patches() {
    let setup = host_with_mods(&[MOD_A]);
    setup.host.run_pipeline().await.unwrap();
    let after_first = setup.provider.journal().len();

    // rediscovery finds the same artifact; already-applied units skip
    setup.host.run_pipeline().await.unwrap();
    assert_eq!(setup.provider.journal().len(), after_first);
}

#[tokio::test]
async fn test_add_hook_can_cancel_discovery_admission() {
    let setup = host_with_mods(&[MOD_A, MOD_C]);
    setup.host.hooks().register(|event, canceled| {
        if event.subject.id == "a" {
            *canceled = true;
        }
    });

    setup.host.run_pipeline().await.unwrap();

    assert!(!setup.host.is_registered("a").await);
    assert!(setup.host.is_registered("c").await);
    let journal = setup.provider.journal();
    assert!(journal.iter().all(|entry| !entry.starts_with("a/")));
}

#[tokio::test]
async fn test_report_records_all_eleven_steps() {
    let setup = host_with_mods(&[MOD_A]);
    let report = setup.host.run_pipeline().await.unwrap();

    let names: Vec<&str> = report.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "discover:integration",
            "discover:regular",
            "load:integration:early",
            "run:integration:early",
            "load:regular:early",
            "run:regular:early",
            "materialize",
            "load:integration:main",
            "run:integration:main",
            "load:regular:main",
            "run:regular:main",
        ]
    );
    assert!(report.finished_at.is_some());
}
