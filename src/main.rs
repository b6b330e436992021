use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};

use edaclient::cache::AnalysisCache;
use edaclient::client::ReportSource;
use edaclient::loader::load_analysis;
use edaclient::logging::{json_log, obj, v_str};
use edaclient::report::ReportFormat;
use edaclient::rows::{distinct_values, filter_rows};
use edaclient::{ApiClient, ClientConfig, ClientError, UploadRequest};

const USAGE: &str = "usage: edaclient <command>

commands:
  health                              backend status
  analyze <path>                      upload a csv/tsv/xlsx/xls file
  fetch <analysis_id>                 stored analysis (cache first)
  ai-report <analysis_id>             AI narrative as HTML
  download <analysis_id> [pdf|xlsx] [out_dir]
  filter <analysis_id> <column> <value>
  values <analysis_id> <column>       distinct values of a preview column

environment:
  EDA_API_BASE, EDA_PAGE_HOST, EDA_RAW_MAX_MB, EDA_ZIP_MAX_MB,
  EDA_ZIP_ALLOWED, EDA_TIMEOUT_SECS, EDA_CACHE_PATH, EDA_CACHE_TTL_SECS,
  LOG_LEVEL, LOG_DOMAINS, LOG_DIR";

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run(&args).await {
        let message = match err.downcast_ref::<ClientError>() {
            Some(client_err) => client_err.message(),
            None => err.to_string(),
        };
        eprintln!("error: {}", message);
        std::process::exit(1);
    }
}

async fn run(args: &[String]) -> Result<()> {
    let command = match args.first().map(String::as_str) {
        None | Some("help" | "-h" | "--help") => {
            println!("{}", USAGE);
            return Ok(());
        }
        Some(command) => command,
    };
    let arg = |i: usize, name: &str| {
        args.get(i)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("missing <{}>\n\n{}", name, USAGE))
    };

    let cfg = ClientConfig::from_env();
    let client = ApiClient::new(&cfg)?;
    let cache = AnalysisCache::open(&cfg.cache, cfg.cache_ttl_secs)?;
    cache.prune_expired(chrono::Utc::now().timestamp() as u64)?;

    let output: Value = match command {
        "health" => serde_json::to_value(client.health().await?)?,
        "analyze" => {
            let path = Path::new(arg(1, "path")?);
            let file = UploadRequest::from_path(path)?;
            let analysis = client.analyze_result(Some(&file)).await?;
            cache.put(&analysis)?;
            analysis.to_value()
        }
        "fetch" => {
            let loaded = load_analysis(&client, &cache, arg(1, "analysis_id")?, None).await?;
            json_log("fetch", obj(&[("source", v_str(loaded.source.as_str()))]));
            loaded.analysis.to_value()
        }
        "ai-report" => {
            let id = arg(1, "analysis_id")?;
            let report = client.ai_report(&ReportSource::Id(id.to_string())).await?;
            serde_json::to_value(report)?
        }
        "download" => {
            let id = arg(1, "analysis_id")?;
            let format: ReportFormat = match args.get(2) {
                Some(f) => f.parse().map_err(|e: String| anyhow!(e))?,
                None => ReportFormat::Pdf,
            };
            let out_dir = args.get(3).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            let report = client.download_report(id, format).await?;
            let path = report.save_to(&out_dir)?;
            json!({
                "file": path.to_string_lossy(),
                "content_type": report.content_type,
                "bytes": report.bytes.len(),
            })
        }
        "filter" => {
            let id = arg(1, "analysis_id")?;
            let column = arg(2, "column")?;
            let value = args.get(3).map(String::as_str).unwrap_or_default();
            let loaded = load_analysis(&client, &cache, id, None).await?;
            let rows = filter_rows(&loaded.analysis.preview_rows(), column, value);
            json!({ "analysis_id": id, "column": column, "value": value, "rows": rows })
        }
        "values" => {
            let id = arg(1, "analysis_id")?;
            let column = arg(2, "column")?;
            let loaded = load_analysis(&client, &cache, id, None).await?;
            let values = distinct_values(&loaded.analysis.preview_rows(), column);
            json!({ "analysis_id": id, "column": column, "values": values })
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
