mod common;

use common::{FakeJob, FakeSite, applier, job_search, test_config};
use std::collections::HashSet;
use tempfile::TempDir;

#[tokio::test]
async fn test_pagination_stops_after_three_empty_pages() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let search = job_search(&config);
    let mut applier = applier(&config);
    let mut site = FakeSite::new();
    let mut seen = HashSet::new();

    let summary = search
        .run(&mut site, &mut applier, "Developer", "Remote", &mut seen)
        .await
        .unwrap();

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.processed, 0);
    assert!(!summary.stopped_by_time);
    assert_eq!(site.refreshes, 3);
    assert_eq!(site.search_loads.len(), 1);
}

#[tokio::test]
async fn test_page_with_new_jobs_advances_offset() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let search = job_search(&config);
    let mut applier = applier(&config);
    let mut site = FakeSite::new().with_job(FakeJob::new("7", "Developer"));
    let mut seen = HashSet::new();

    let summary = search
        .run(&mut site, &mut applier, "Developer", "Remote", &mut seen)
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.submitted, 1);
    assert!(seen.contains("7"));
    assert_eq!(site.search_loads.len(), 2);
    assert!(site.search_loads[0].contains("start=0"));
    assert!(site.search_loads[1].contains("start=25"));
    assert!(!site.search_loads[0].contains("distance"));
}

#[tokio::test]
async fn test_card_filters() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let search = job_search(&config);
    let mut site = FakeSite::new()
        .with_job(FakeJob::new("1", "Developer"))
        .with_job(FakeJob::new("2", "Senior Developer"))
        .with_job(FakeJob::new("3", "Backend Developer"))
        .with_job(FakeJob::new("search", "Frontend Developer"));
    site.cards.push(("4".into(), "Platform Developer\nAcme\nApplied".into()));
    // Same rendered text as job 1: only the first card counts.
    let duplicate = site.cards[0].1.clone();
    site.cards.push(("5".into(), duplicate));
    site.url = "https://www.linkedin.com/jobs/search/?keywords=Developer&start=0".into();

    let seen = HashSet::from(["3".to_string()]);
    let ids = search.new_job_ids(&mut site, &seen).await.unwrap();
    assert_eq!(ids, vec!["1".to_string()]);
}

#[tokio::test]
async fn test_unreadable_card_is_skipped() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let search = job_search(&config);
    let mut site = FakeSite::new()
        .with_job(FakeJob::new("1", "Developer"))
        .with_job(FakeJob::new("2", "Rust Developer"));
    site.broken_cards.insert("1".to_string());
    site.url = "https://www.linkedin.com/jobs/search/?keywords=Developer&start=0".into();

    let ids = search.new_job_ids(&mut site, &HashSet::new()).await.unwrap();
    assert_eq!(ids, vec!["2".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_time_budget_stops_search() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.limits.max_search_secs = 60;
    config.timing.refresh_pause_ms = 40_000;
    let search = job_search(&config);
    let mut applier = applier(&config);
    let mut site = FakeSite::new();
    let mut seen = HashSet::new();

    let summary = search
        .run(&mut site, &mut applier, "Developer", "Remote", &mut seen)
        .await
        .unwrap();

    // Two refresh pauses take 80s, past the 60s budget and before the empty page limit.
    assert!(summary.stopped_by_time);
    assert_eq!(summary.pages, 2);
    assert_eq!(site.refreshes, 2);
}
