//! End-to-end matching scenarios against an in-memory catalog

mod helpers;

use chrono::NaiveDate;
use helpers::{candidate, female, scene_at, InMemoryCatalog, ScriptedOperator, ScriptedProvider};
use scenematch_scrape::providers::ProviderAdapter;
use scenematch_scrape::services::operator::AliasAnswer;
use scenematch_scrape::services::CandidateFetcher;
use scenematch_scrape::types::{Candidate, Gender, LocalScene, PerformerProfile, PerformerStub, SearchKind};
use scenematch_scrape::workflow::{BatchRunner, RunMode, RunOptions, RunStatistics, SceneOutcome, ScenePipeline};
use scenematch_scrape::{MatchSession, ScrapeConfig, ScrapeError};
use std::sync::Arc;

fn config() -> ScrapeConfig {
    ScrapeConfig {
        confirm_questionable_aliases: false,
        get_images_from_portrait_site: false,
        ..ScrapeConfig::default()
    }
}

fn fetcher(provider: &Arc<ScriptedProvider>) -> CandidateFetcher {
    let adapter: Arc<dyn ProviderAdapter> = provider.clone();
    CandidateFetcher::new(adapter)
}

async fn process_once(
    config: &ScrapeConfig,
    catalog: &InMemoryCatalog,
    provider: ScriptedProvider,
    operator: &mut ScriptedOperator,
    scene_id: &str,
) -> SceneOutcome {
    let provider = Arc::new(provider);
    let fetcher = fetcher(&provider);
    let tags = config.tag_names(fetcher.provider_name());
    let pipeline = ScenePipeline::new(config, &tags, catalog, &fetcher, None);
    let mut session = MatchSession::new(config.max_consecutive_errors);
    let scene = catalog.scene(scene_id);
    pipeline
        .process(&mut session, operator, &scene)
        .await
        .expect("scene should not fail")
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

#[tokio::test]
async fn matched_scene_gets_performer_led_title() {
    let catalog = InMemoryCatalog::new();
    let studio = catalog.add_studio("Studio X");
    let jane = catalog.add_performer("Jane Doe", &[]);
    let scene_id = catalog.add_scene(LocalScene {
        path: "/media/Studio X/Jane Doe And John Roe Sc1 1080p.mp4".into(),
        title: Some("Jane Doe And John Roe Sc1 1080p".into()),
        studio: Some(studio.clone()),
        date: date(2021, 3, 4),
        ..Default::default()
    });

    let mut remote = candidate("Jane Doe and John Roe", Some("Studio X"), date(2021, 3, 4));
    remote.performers = vec![female("Jane Doe")];
    let provider = ScriptedProvider::new().with_scenes(vec![remote]);

    let mut operator = ScriptedOperator::default();
    let outcome = process_once(&config(), &catalog, provider, &mut operator, &scene_id).await;

    assert_eq!(outcome, SceneOutcome::Matched);
    let scene = catalog.scene(&scene_id);
    assert_eq!(scene.title.as_deref(), Some("Jane Doe and John Roe"));
    assert!(scene.performer_ids.contains(&jane));
    assert_eq!(scene.studio, Some(studio));
    let scraped = catalog.tag_id("Scraped From Scripted").expect("scrape tag should be created");
    assert!(scene.tag_ids.contains(&scraped));
}

#[tokio::test]
async fn unmatched_tag_is_added_once_across_runs() {
    let catalog = InMemoryCatalog::new();
    let scene_id = catalog.add_scene(scene_at("/media/Unknown Scene 2020.mp4"));
    let config = config();
    let provider = Arc::new(ScriptedProvider::new());
    let fetcher = fetcher(&provider);
    let runner = BatchRunner {
        config: &config,
        catalog: &catalog,
        fetcher: &fetcher,
        images: None,
    };

    let mut first = RunStatistics::default();
    runner
        .run(&mut ScriptedOperator::default(), &RunOptions::default(), &mut first)
        .await
        .unwrap();
    assert_eq!(first.unmatched, 1);
    assert_eq!(catalog.commit_count(), 1);

    let retry = RunOptions {
        mode: RunMode::RetryUnmatched,
        ..Default::default()
    };
    let mut second = RunStatistics::default();
    runner
        .run(&mut ScriptedOperator::default(), &retry, &mut second)
        .await
        .unwrap();
    assert_eq!(second.considered, 1);
    assert_eq!(second.unmatched, 1);

    let unmatched = catalog.tag_id("Missing From Scripted").unwrap();
    let scene = catalog.scene(&scene_id);
    assert_eq!(scene.tag_ids.iter().filter(|t| **t == unmatched).count(), 1);
    // Nothing changed on the second pass, so nothing was written
    assert_eq!(catalog.commit_count(), 1);
}

#[tokio::test]
async fn default_run_skips_scenes_already_tagged_unmatched() {
    let catalog = InMemoryCatalog::new();
    catalog.add_scene(scene_at("/media/Nothing Here.mp4"));
    let config = config();
    let provider = Arc::new(ScriptedProvider::new());
    let fetcher = fetcher(&provider);
    let runner = BatchRunner {
        config: &config,
        catalog: &catalog,
        fetcher: &fetcher,
        images: None,
    };

    let mut first = RunStatistics::default();
    runner
        .run(&mut ScriptedOperator::default(), &RunOptions::default(), &mut first)
        .await
        .unwrap();
    let mut second = RunStatistics::default();
    runner
        .run(&mut ScriptedOperator::default(), &RunOptions::default(), &mut second)
        .await
        .unwrap();

    assert_eq!(first.considered, 1);
    assert_eq!(second.considered, 0);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn identical_candidates_leave_scene_ambiguous_and_untouched() {
    let catalog = InMemoryCatalog::new();
    let scene_id = catalog.add_scene(scene_at("/media/Pool Day.mp4"));

    let mut first = candidate("Pool Day", None, None);
    first.performers = vec![female("Ann Lee")];
    let second = candidate("Pool Day", None, None);
    let provider = ScriptedProvider::new().with_scenes(vec![first, second]);

    let mut operator = ScriptedOperator::default();
    let outcome = process_once(&config(), &catalog, provider, &mut operator, &scene_id).await;

    assert_eq!(outcome, SceneOutcome::Ambiguous);
    assert!(operator.candidate_prompts.is_empty());

    let scene = catalog.scene(&scene_id);
    assert_eq!(scene.title, None);
    assert_eq!(scene.studio, None);
    assert!(scene.performer_ids.is_empty());
    let ambiguous = catalog.tag_id("Scripted Ambiguous").unwrap();
    assert_eq!(scene.tag_ids.iter().cloned().collect::<Vec<_>>(), vec![ambiguous]);
    assert_eq!(catalog.tag_id("Scraped From Scripted"), None);
}

#[tokio::test]
async fn operator_choice_resolves_ties() {
    let catalog = InMemoryCatalog::new();
    let scene_id = catalog.add_scene(scene_at("/media/Pool Day.mp4"));
    let provider = ScriptedProvider::new().with_scenes(vec![
        candidate("Pool Day", None, None),
        candidate("Pool Day Part Two", None, None),
    ]);
    let config = ScrapeConfig {
        manual_disambiguate: true,
        ..config()
    };

    let mut operator = ScriptedOperator {
        choices: [Some(1)].into_iter().collect(),
        ..Default::default()
    };
    let outcome = process_once(&config, &catalog, provider, &mut operator, &scene_id).await;

    assert_eq!(outcome, SceneOutcome::Matched);
    assert_eq!(operator.candidate_prompts.len(), 1);
    assert_eq!(operator.candidate_prompts[0].len(), 2);
    assert_eq!(catalog.scene(&scene_id).title.as_deref(), Some("Pool Day Part Two"));
}

#[tokio::test]
async fn operator_skip_leaves_scene_ambiguous() {
    let catalog = InMemoryCatalog::new();
    let scene_id = catalog.add_scene(scene_at("/media/Pool Day.mp4"));
    let provider = ScriptedProvider::new().with_scenes(vec![
        candidate("Pool Day", None, None),
        candidate("Pool Day Part Two", None, None),
    ]);
    let config = ScrapeConfig {
        manual_disambiguate: true,
        ..config()
    };

    let mut operator = ScriptedOperator {
        choices: [None].into_iter().collect(),
        ..Default::default()
    };
    let outcome = process_once(&config, &catalog, provider, &mut operator, &scene_id).await;
    assert_eq!(outcome, SceneOutcome::Ambiguous);
    assert_eq!(catalog.scene(&scene_id).title, None);
}

#[tokio::test]
async fn provider_outage_stops_run_before_next_scene() {
    let catalog = InMemoryCatalog::new();
    for i in 0..5 {
        catalog.add_scene(scene_at(&format!("/media/Scene {}.mp4", i)));
    }
    let config = config();
    let provider = Arc::new(ScriptedProvider::failing());
    let fetcher = fetcher(&provider);
    let runner = BatchRunner {
        config: &config,
        catalog: &catalog,
        fetcher: &fetcher,
        images: None,
    };

    let mut stats = RunStatistics::default();
    let err = runner
        .run(&mut ScriptedOperator::default(), &RunOptions::default(), &mut stats)
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::ProviderOutage { failures: 4, .. }));
    assert!(err.is_fatal());
    assert_eq!(stats.considered, 3);
    assert_eq!(stats.provider_failures, 3);
    assert_eq!(provider.call_count(), 4);
    // No scene was tagged unmatched because of the outage
    assert_eq!(catalog.commit_count(), 0);
    assert_eq!(catalog.tag_id("Missing From Scripted"), None);
}

#[tokio::test]
async fn trusted_single_name_resolves_to_canonical_performer() {
    let catalog = InMemoryCatalog::new();
    let scene_id = catalog.add_scene(scene_at("/media/Beach Day.mp4"));

    let mut remote = candidate("Beach Day", None, None);
    remote.performers = vec![PerformerStub {
        parent: Some(PerformerProfile {
            name: "Alexandra Smith".into(),
            gender: Some(Gender::Female),
            aliases: vec!["Alex".into()],
            ..Default::default()
        }),
        ..female("Alex")
    }];
    let provider = ScriptedProvider::new().with_scenes(vec![remote]);
    let config = ScrapeConfig {
        trust_remote_aliases: true,
        ..config()
    };

    let mut operator = ScriptedOperator::default();
    let outcome = process_once(&config, &catalog, provider, &mut operator, &scene_id).await;

    assert_eq!(outcome, SceneOutcome::Matched);
    assert!(operator.alias_prompts.is_empty());
    let performer = catalog
        .performer_named("Alexandra Smith")
        .expect("canonical performer should be created");
    assert!(performer.aliases.contains(&"Alex".to_string()));
    let scene = catalog.scene(&scene_id);
    assert!(scene.performer_ids.contains(&performer.id));
    assert_eq!(scene.title.as_deref(), Some("Alexandra Smith Beach Day"));
    assert_eq!(catalog.performer_named("Alex"), None);
}

#[tokio::test]
async fn unverifiable_alias_tags_scene_instead_of_guessing() {
    let catalog = InMemoryCatalog::new();
    let scene_id = catalog.add_scene(scene_at("/media/Beach Day.mp4"));

    let mut remote = candidate("Beach Day", None, None);
    remote.performers = vec![PerformerStub {
        parent: Some(PerformerProfile {
            name: "Alexandra Smith".into(),
            ..Default::default()
        }),
        ..female("Alex Smyth")
    }];
    let provider = ScriptedProvider::new().with_scenes(vec![remote]);

    let mut operator = ScriptedOperator::default();
    let outcome = process_once(&config(), &catalog, provider, &mut operator, &scene_id).await;

    assert_eq!(outcome, SceneOutcome::Matched);
    assert!(operator.alias_prompts.is_empty());
    assert_eq!(catalog.performer_named("Alexandra Smith"), None);
    let unconfirmed = catalog.tag_id("Scripted Unconfirmed Alias").unwrap();
    let scene = catalog.scene(&scene_id);
    assert!(scene.tag_ids.contains(&unconfirmed));
    assert!(scene.performer_ids.is_empty());
    assert_eq!(scene.title.as_deref(), Some("Beach Day"));
}

#[tokio::test]
async fn confirmed_alias_is_stored_on_created_performer() {
    let catalog = InMemoryCatalog::new();
    let scene_id = catalog.add_scene(scene_at("/media/Beach Day.mp4"));

    let mut remote = candidate("Beach Day", None, None);
    remote.performers = vec![PerformerStub {
        parent: Some(PerformerProfile {
            name: "Alexandra Smith".into(),
            ..Default::default()
        }),
        ..female("Alex Smyth")
    }];
    let provider = ScriptedProvider::new().with_scenes(vec![remote]);
    let config = ScrapeConfig {
        confirm_questionable_aliases: true,
        ..config()
    };

    let mut operator = ScriptedOperator {
        alias_answers: [AliasAnswer::Yes].into_iter().collect(),
        ..Default::default()
    };
    let outcome = process_once(&config, &catalog, provider, &mut operator, &scene_id).await;

    assert_eq!(outcome, SceneOutcome::Matched);
    assert_eq!(
        operator.alias_prompts,
        vec![("Alex Smyth".to_string(), "Alexandra Smith".to_string())]
    );
    let performer = catalog.performer_named("Alexandra Smith").unwrap();
    assert_eq!(performer.aliases, vec!["Alex Smyth".to_string()]);
}

#[tokio::test]
async fn unparseable_path_is_tagged_unmatched() {
    let catalog = InMemoryCatalog::new();
    let scene_id = catalog.add_scene(scene_at("/media/no_extension"));
    let provider = ScriptedProvider::new();

    let mut operator = ScriptedOperator::default();
    let outcome = process_once(&config(), &catalog, provider, &mut operator, &scene_id).await;

    assert_eq!(outcome, SceneOutcome::ParseFailure);
    let unmatched = catalog.tag_id("Missing From Scripted").unwrap();
    assert!(catalog.scene(&scene_id).tag_ids.contains(&unmatched));
}

/// Remote scene whose only performer is linked to a canonical name that
/// nothing corroborates
fn scene_with_linked_alias(title: &str) -> Candidate {
    let mut remote = candidate(title, Some("Studio X"), None);
    remote.performers = vec![PerformerStub {
        parent: Some(PerformerProfile {
            name: "Alexandra Smith".into(),
            ..Default::default()
        }),
        ..female("Alex Smyth")
    }];
    remote
}

/// Two scenes sharing the same linked alias, run in one batch. Performers
/// are not created, so only the run's alias memory can skip a prompt.
async fn run_two_aliased_scenes(answer: AliasAnswer) -> (ScriptedOperator, RunStatistics) {
    let catalog = InMemoryCatalog::new();
    catalog.add_scene(scene_at("/media/Beach Day.mp4"));
    catalog.add_scene(scene_at("/media/Beach Night.mp4"));
    let config = ScrapeConfig {
        confirm_questionable_aliases: true,
        add_performers: false,
        ..config()
    };
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_scenes(vec![scene_with_linked_alias("Beach Day")])
            .with_scenes(vec![scene_with_linked_alias("Beach Night")]),
    );
    let fetcher = fetcher(&provider);
    let runner = BatchRunner {
        config: &config,
        catalog: &catalog,
        fetcher: &fetcher,
        images: None,
    };

    let mut operator = ScriptedOperator {
        alias_answers: [answer].into_iter().collect(),
        ..Default::default()
    };
    let mut stats = RunStatistics::default();
    runner
        .run(&mut operator, &RunOptions::default(), &mut stats)
        .await
        .unwrap();
    (operator, stats)
}

#[tokio::test]
async fn always_answer_is_remembered_for_the_rest_of_the_run() {
    let (operator, stats) = run_two_aliased_scenes(AliasAnswer::Always).await;

    assert_eq!(stats.matched, 2);
    assert_eq!(
        operator.alias_prompts,
        vec![("Alex Smyth".to_string(), "Alexandra Smith".to_string())]
    );
}

#[tokio::test]
async fn always_for_site_answer_is_remembered_for_the_rest_of_the_run() {
    let (operator, stats) = run_two_aliased_scenes(AliasAnswer::AlwaysForSite).await;

    assert_eq!(stats.matched, 2);
    assert_eq!(operator.alias_prompts.len(), 1);
}

#[tokio::test]
async fn yes_answer_asks_again_on_the_next_scene() {
    // The second prompt finds no scripted answer and is declined
    let (operator, stats) = run_two_aliased_scenes(AliasAnswer::Yes).await;

    assert_eq!(stats.matched, 2);
    assert_eq!(operator.alias_prompts.len(), 2);
}

#[tokio::test]
async fn rejected_update_is_counted_and_run_continues() {
    let catalog = InMemoryCatalog::new();
    let first_id = catalog.add_scene(scene_at("/media/Pool Day.mp4"));
    let second_id = catalog.add_scene(scene_at("/media/Beach Night.mp4"));
    let config = config();
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_scenes(vec![candidate("Pool Day", None, None)])
            .with_scenes(vec![candidate("Beach Night", None, None)]),
    );
    let fetcher = fetcher(&provider);
    let runner = BatchRunner {
        config: &config,
        catalog: &catalog,
        fetcher: &fetcher,
        images: None,
    };

    catalog.reject_commits(1);
    let mut stats = RunStatistics::default();
    runner
        .run(&mut ScriptedOperator::default(), &RunOptions::default(), &mut stats)
        .await
        .unwrap();

    assert_eq!(stats.considered, 2);
    assert_eq!(stats.update_failures, 1);
    assert_eq!(stats.matched, 1);

    let first = catalog.scene(&first_id);
    assert_eq!(first.title, None);
    assert!(first.tag_ids.is_empty());
    assert_eq!(catalog.scene(&second_id).title.as_deref(), Some("Beach Night"));
    assert_eq!(catalog.commit_count(), 1);
}

#[tokio::test]
async fn narrowed_search_is_scored_against_first_query() {
    let catalog = InMemoryCatalog::new();
    let acme = catalog.add_studio("Acme");
    let scene_id = catalog.add_scene(LocalScene {
        path: "/media/Acme Beach Day.mp4".into(),
        title: Some("Beach Day".into()),
        studio: Some(acme),
        ..Default::default()
    });

    // Only the "studio date title" descriptor of the first result is close
    // to the scene, and only to the query before the studio was appended
    let hits = vec![
        candidate("Day", Some("Acme Beach"), None),
        candidate("Something Else", Some("Other"), None),
    ];
    let provider = ScriptedProvider::new()
        .with_scenes(hits.clone())
        .with_scenes(hits);
    let config = ScrapeConfig {
        parse_with_filename: false,
        ..config()
    };

    let provider = Arc::new(provider);
    let fetcher = fetcher(&provider);
    let tags = config.tag_names(fetcher.provider_name());
    let pipeline = ScenePipeline::new(&config, &tags, &catalog, &fetcher, None);
    let mut session = MatchSession::new(config.max_consecutive_errors);
    let scene = catalog.scene(&scene_id);
    let outcome = pipeline
        .process(&mut session, &mut ScriptedOperator::default(), &scene)
        .await
        .unwrap();

    let text_queries: Vec<String> = provider
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter_map(|kind| match kind {
            SearchKind::Text { query, .. } => Some(query.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(text_queries, vec!["Acme Beach Day", "Acme Beach Day Acme"]);
    assert_eq!(outcome, SceneOutcome::Matched);
    assert_eq!(catalog.scene(&scene_id).title.as_deref(), Some("Day"));
}
