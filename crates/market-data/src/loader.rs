use crate::error::DataError;
use crate::panel::{AssetSeries, PanelFile, PricePanel, PricePoint};
use crate::signals::SignalPanel;
use configuration::GapPolicy;
use futures::future::join_all;
use std::path::{Path, PathBuf};

/// Loads a whole panel from a single JSON file in the [`PanelFile`] layout.
pub async fn load_panel_file(path: impl AsRef<Path>, gap_policy: GapPolicy) -> Result<PricePanel, DataError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let file: PanelFile = serde_json::from_slice(&bytes)?;
    let panel = file.into_panel(gap_policy)?;

    tracing::info!(
        path = %path.display(),
        assets = panel.num_assets(),
        rows = panel.len(),
        "Loaded price panel."
    );
    Ok(panel)
}

/// Loads one `<SYMBOL>.json` series per symbol from `directory` and aligns them into a
/// panel. Each file holds an array of `{ "timestamp": ..., "close": ... }` points.
///
/// All files are read concurrently.
pub async fn load_asset_directory(
    directory: impl AsRef<Path>,
    symbols: &[String],
    gap_policy: GapPolicy,
) -> Result<PricePanel, DataError> {
    let directory = directory.as_ref();

    // 1. Concurrently read the series of every symbol.
    let fetch_futures = symbols.iter().map(|symbol| {
        let path = directory.join(format!("{}.json", symbol));
        load_asset_series(path, symbol.clone())
    });
    let results = join_all(fetch_futures).await;

    // 2. Propagate the first failure, keeping the symbol order of the request.
    let series = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    // 3. Align everything onto one index.
    let panel = PricePanel::from_series(series, gap_policy)?;
    tracing::info!(
        directory = %directory.display(),
        assets = panel.num_assets(),
        rows = panel.len(),
        "Loaded and aligned per-asset series."
    );
    Ok(panel)
}

async fn load_asset_series(path: PathBuf, symbol: String) -> Result<AssetSeries, DataError> {
    let bytes = tokio::fs::read(&path).await?;
    let points: Vec<PricePoint> = serde_json::from_slice(&bytes)?;
    tracing::debug!(symbol = %symbol, points = points.len(), "Read asset series.");
    Ok(AssetSeries { symbol, points })
}

/// Loads entry/exit signals from a JSON file in the [`SignalPanel`] layout.
pub async fn load_signal_file(path: impl AsRef<Path>) -> Result<SignalPanel, DataError> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn loads_panel_file_with_forward_fill() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("panel.json");
        std::fs::write(
            &path,
            r#"{
                "index": ["2021-01-04T00:00:00Z", "2021-01-05T00:00:00Z", "2021-01-06T00:00:00Z"],
                "columns": [
                    {"symbol": "AAPL", "prices": [100.0, null, 102.0]},
                    {"symbol": "MSFT", "prices": [200.0, 201.0, 202.0]}
                ]
            }"#,
        )
        .unwrap();

        let panel = load_panel_file(&path, GapPolicy::ForwardFill).await.unwrap();
        assert_eq!(panel.assets(), &["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(panel.column(0), &[100.0, 100.0, 102.0]);

        assert!(matches!(
            load_panel_file(&path, GapPolicy::Reject).await,
            Err(DataError::MissingPrice { .. })
        ));
    }

    #[tokio::test]
    async fn loads_and_aligns_asset_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("AAA.json"),
            r#"[{"timestamp": "2021-01-04T00:00:00Z", "close": 1.0},
                {"timestamp": "2021-01-05T00:00:00Z", "close": 2.0}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("BBB.json"),
            r#"[{"timestamp": "2021-01-04T00:00:00Z", "close": 10.0},
                {"timestamp": "2021-01-05T00:00:00Z", "close": 20.0}]"#,
        )
        .unwrap();

        let symbols = vec!["BBB".to_string(), "AAA".to_string()];
        let panel = load_asset_directory(dir.path(), &symbols, GapPolicy::Reject).await.unwrap();
        assert_eq!(panel.assets(), symbols.as_slice());
        assert_eq!(panel.column(0), &[10.0, 20.0]);

        let missing = vec!["CCC".to_string()];
        assert!(matches!(
            load_asset_directory(dir.path(), &missing, GapPolicy::Reject).await,
            Err(DataError::Io(_))
        ));
    }
}
