//! Search result pagination for one (position, location) pair.

use crate::apply::{ApplyError, JobApplier};
use crate::backend::{Backend, BackendError};
use crate::blacklist::Blacklist;
use crate::config::schema::BotConfig;
use crate::selectors::{APPLIED_CARD_TEXT, SEARCH_URL, SiteSelectors};
use crate::wait::{Pacer, Pause, WaitError, wait_for_ready_state};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

const SECONDS_PER_DAY: u32 = 86_400;

/// Filters shared by every results page of a run.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub days_old: u32,
    pub distance: u32,
    pub experience_levels: Vec<u8>,
}

impl SearchFilters {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            days_old: config.days_old,
            distance: config.distance,
            experience_levels: config.experience_level.clone(),
        }
    }

    /// Results page URL for `position` in `location`, starting at `start`.
    pub fn url(&self, position: &str, location: &str, start: u32) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(SEARCH_URL)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("keywords", position)
                .append_pair("location", location)
                .append_pair("start", &start.to_string());
            if self.days_old > 0 {
                query.append_pair("f_TPR", &format!("r{}", self.days_old * SECONDS_PER_DAY));
            }
            if self.distance > 0 && !location.to_lowercase().contains("remote") {
                query.append_pair("distance", &self.distance.to_string());
            }
            query.append_pair("f_AL", "true");
            if !self.experience_levels.is_empty() {
                let codes: Vec<String> = self.experience_levels.iter().map(|c| c.to_string()).collect();
                query.append_pair("f_E", &codes.join(","));
            }
            query.append_pair("f_JT", "F");
        }
        Ok(url)
    }
}

/// Every (position, location) pair once, in random order, capped at `max`.
pub fn search_combos<R: Rng + ?Sized>(
    positions: &[String],
    locations: &[String],
    max: usize,
    rng: &mut R,
) -> Vec<(String, String)> {
    let mut combos: Vec<(String, String)> = Vec::with_capacity(positions.len() * locations.len());
    for position in positions {
        for location in locations {
            let combo = (position.clone(), location.clone());
            if !combos.contains(&combo) {
                combos.push(combo);
            }
        }
    }
    combos.shuffle(rng);
    combos.truncate(max);
    combos
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSummary {
    pub pages: u32,
    pub processed: u32,
    pub submitted: u32,
    pub stopped_by_time: bool,
}

pub struct JobSearch {
    pacer: Pacer,
    selectors: SiteSelectors,
    blacklist: Blacklist,
    filters: SearchFilters,
    page_size: u32,
    empty_page_limit: u32,
    time_budget: Duration,
}

impl JobSearch {
    pub fn new(
        pacer: Pacer,
        selectors: SiteSelectors,
        blacklist: Blacklist,
        filters: SearchFilters,
        config: &BotConfig,
    ) -> Self {
        Self {
            pacer,
            selectors,
            blacklist,
            filters,
            page_size: config.limits.page_size,
            empty_page_limit: config.limits.empty_page_limit.max(1),
            time_budget: Duration::from_secs(config.limits.max_search_secs),
        }
    }

    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    /// Page through results until too many consecutive pages bring nothing
    /// new or the time budget runs out. Job IDs handed to the applier are
    /// added to `seen`.
    pub async fn run<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        applier: &mut JobApplier,
        position: &str,
        location: &str,
        seen: &mut HashSet<String>,
    ) -> Result<SearchSummary, ApplyError> {
        let started = Instant::now();
        let mut summary = SearchSummary::default();
        let mut start = 0;
        let mut empty_pages = 0;

        self.load_page(backend, position, location, start).await?;

        loop {
            if self.pacer.is_cancelled() {
                return Err(ApplyError::Cancelled);
            }
            if started.elapsed() >= self.time_budget {
                info!("Search time budget for {}: {} exhausted", position, location);
                summary.stopped_by_time = true;
                break;
            }
            if empty_pages >= self.empty_page_limit {
                info!("Stopping search - too many consecutive empty pages");
                break;
            }
            summary.pages += 1;

            match self.new_job_ids(backend, seen).await {
                Ok(job_ids) if !job_ids.is_empty() => {
                    empty_pages = 0;
                    info!("{} new jobs on page at offset {}", job_ids.len(), start);
                    for job_id in job_ids {
                        seen.insert(job_id.clone());
                        let outcome = applier.apply(backend, &job_id).await?;
                        summary.processed += 1;
                        if outcome.result {
                            summary.submitted += 1;
                            info!("Applied to {}", job_id);
                        } else {
                            info!("Failed to apply to {}", job_id);
                        }
                    }
                    start += self.page_size;
                    self.load_page(backend, position, location, start).await?;
                }
                Ok(_) => {
                    empty_pages += 1;
                    info!(
                        "No new jobs found (empty page {}/{})",
                        empty_pages, self.empty_page_limit
                    );
                    if let Err(e) = backend.refresh().await {
                        warn!("Refresh failed: {}", e);
                    }
                    self.pacer.pause(Pause::Refresh).await.map_err(cancelled)?;
                }
                Err(e) => {
                    empty_pages += 1;
                    warn!(
                        "Error reading results page (empty page {}/{}): {}",
                        empty_pages, self.empty_page_limit, e
                    );
                }
            }
        }
        Ok(summary)
    }

    async fn load_page<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        position: &str,
        location: &str,
        start: u32,
    ) -> Result<(), ApplyError> {
        let url = match self.filters.url(position, location, start) {
            Ok(url) => url,
            Err(e) => {
                warn!("Could not build search URL: {}", e);
                return Ok(());
            }
        };
        info!("Loading jobs page with URL: {}", url);
        if let Err(e) = backend.navigate(url.as_str()).await {
            warn!("Error loading jobs page: {}", e);
            return Ok(());
        }
        match wait_for_ready_state(backend, &self.pacer, self.pacer.timing().page_load_timeout_ms).await
        {
            Ok(()) => {}
            Err(WaitError::Cancelled) => return Err(ApplyError::Cancelled),
            Err(e) => warn!("Jobs page did not finish loading: {}", e),
        }
        self.pacer.human_delay().await.map_err(cancelled)
    }

    /// Unprocessed job IDs on the current results page, in card order.
    pub async fn new_job_ids<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        seen: &HashSet<String>,
    ) -> Result<Vec<String>, BackendError> {
        let cards = backend.find_elements(&self.selectors.job_cards).await?;
        let mut texts = HashSet::new();
        let mut job_ids = Vec::new();

        for card in cards {
            if !texts.insert(card.text.clone()) {
                continue;
            }
            if card.text.contains(APPLIED_CARD_TEXT) {
                continue;
            }
            let title = card.text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
            if self.blacklist.is_blacklisted(title) {
                debug!(
                    "Skipping blacklisted card: {} (matched {})",
                    title,
                    self.blacklist.matching_pattern(title).unwrap_or_default()
                );
                continue;
            }
            let job_id = match backend.attribute(&card, self.selectors.job_id_attribute).await {
                Ok(Some(id)) => id.trim().to_string(),
                Ok(None) => continue,
                Err(e) => {
                    debug!("Skipping unreadable card '{}': {}", title, e);
                    continue;
                }
            };
            if job_id.is_empty() || job_id == "search" || seen.contains(&job_id) {
                continue;
            }
            if !job_ids.contains(&job_id) {
                job_ids.push(job_id);
            }
        }
        Ok(job_ids)
    }
}

fn cancelled(_: WaitError) -> ApplyError {
    ApplyError::Cancelled
}
