//! Render-first lookup of an analysis for a consumer view.

use crate::cache::AnalysisCache;
use crate::client::{AnalysisResult, ApiClient, Transport};
use crate::error::ClientError;
use crate::logging::{log, obj, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Handed over by whoever navigated here.
    Navigation,
    Cache,
    Backend,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Navigation => "navigation",
            Source::Cache => "cache",
            Source::Backend => "backend",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub analysis: AnalysisResult,
    pub source: Source,
}

/// What can be shown without touching the network: navigation state whose
/// id matches, otherwise a cache hit. Cache read failures count as a miss.
pub fn resolve_local(
    analysis_id: &str,
    navigation: Option<&AnalysisResult>,
    cache: &AnalysisCache,
) -> Option<Loaded> {
    if let Some(nav) = navigation.filter(|n| n.analysis_id == analysis_id) {
        return Some(Loaded {
            analysis: nav.clone(),
            source: Source::Navigation,
        });
    }
    match cache.get(analysis_id) {
        Ok(Some(analysis)) => Some(Loaded {
            analysis,
            source: Source::Cache,
        }),
        Ok(None) => None,
        Err(err) => {
            log(
                Level::Warn,
                Domain::Cache,
                "read_failed",
                obj(&[("analysis_id", v_str(analysis_id)), ("msg", v_str(&err.to_string()))]),
            );
            None
        }
    }
}

/// Fetch from the backend and store the result in the cache.
pub async fn refresh<T: Transport>(
    client: &ApiClient<T>,
    cache: &AnalysisCache,
    analysis_id: &str,
) -> Result<Loaded, ClientError> {
    let analysis = client.fetch_analysis(analysis_id).await?;
    store(cache, &analysis);
    Ok(Loaded {
        analysis,
        source: Source::Backend,
    })
}

/// Cache write failures are logged and otherwise ignored.
fn store(cache: &AnalysisCache, analysis: &AnalysisResult) {
    if let Err(err) = cache.put(analysis) {
        log(
            Level::Warn,
            Domain::Cache,
            "write_failed",
            obj(&[
                ("analysis_id", v_str(&analysis.analysis_id)),
                ("msg", v_str(&err.to_string())),
            ]),
        );
    }
}

/// Navigation state, then cache, then backend.
pub async fn load_analysis<T: Transport>(
    client: &ApiClient<T>,
    cache: &AnalysisCache,
    analysis_id: &str,
    navigation: Option<&AnalysisResult>,
) -> Result<Loaded, ClientError> {
    let analysis_id = analysis_id.trim();
    if analysis_id.is_empty() {
        return Err(ClientError::input("No analysis id provided"));
    }
    if let Some(local) = resolve_local(analysis_id, navigation, cache) {
        log(
            Level::Debug,
            Domain::Fetch,
            "resolved_locally",
            obj(&[
                ("analysis_id", v_str(analysis_id)),
                ("source", v_str(local.source.as_str())),
            ]),
        );
        if local.source == Source::Navigation {
            store(cache, &local.analysis);
        }
        return Ok(local);
    }
    refresh(client, cache, analysis_id).await
}
