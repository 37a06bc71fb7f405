use crate::error::DataError;
use chrono::{DateTime, Utc};
use configuration::GapPolicy;
use core_types::AssetGroup;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Close prices for a set of assets on one shared, strictly increasing timestamp index.
///
/// Every column has exactly one finite, positive price per index row. Gaps are resolved
/// at construction time according to a [`GapPolicy`], so readers never see a hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PanelFile", try_from = "PanelFile")]
pub struct PricePanel {
    assets: Vec<String>,
    index: Vec<DateTime<Utc>>,
    columns: Vec<Vec<f64>>,
    lookup: HashMap<String, usize>,
}

/// A single observation of an asset's close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

/// One asset's own time series, before alignment onto a shared index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

/// The on-disk panel layout: a shared index and one nullable column per asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelFile {
    pub index: Vec<DateTime<Utc>>,
    pub columns: Vec<PanelColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelColumn {
    pub symbol: String,
    pub prices: Vec<Option<f64>>,
}

impl PanelFile {
    pub fn into_panel(self, gap_policy: GapPolicy) -> Result<PricePanel, DataError> {
        let columns = self
            .columns
            .into_iter()
            .map(|c| (c.symbol, c.prices))
            .collect();
        PricePanel::new(self.index, columns, gap_policy)
    }
}

impl From<PricePanel> for PanelFile {
    fn from(panel: PricePanel) -> Self {
        let columns = panel
            .assets
            .into_iter()
            .zip(panel.columns)
            .map(|(symbol, prices)| PanelColumn {
                symbol,
                prices: prices.into_iter().map(Some).collect(),
            })
            .collect();
        Self { index: panel.index, columns }
    }
}

impl TryFrom<PanelFile> for PricePanel {
    type Error = DataError;

    fn try_from(file: PanelFile) -> Result<Self, Self::Error> {
        file.into_panel(GapPolicy::Reject)
    }
}

impl PricePanel {
    /// Builds a panel from a shared index and nullable columns.
    pub fn new(
        index: Vec<DateTime<Utc>>,
        columns: Vec<(String, Vec<Option<f64>>)>,
        gap_policy: GapPolicy,
    ) -> Result<Self, DataError> {
        if index.is_empty() {
            return Err(DataError::Empty("the timestamp index has no rows".to_string()));
        }
        if columns.is_empty() {
            return Err(DataError::Empty("no asset columns".to_string()));
        }
        if let Some(pos) = index.windows(2).position(|w| w[1] <= w[0]) {
            return Err(DataError::UnorderedIndex(pos + 1));
        }

        let mut assets = Vec::with_capacity(columns.len());
        let mut filled_columns = Vec::with_capacity(columns.len());
        let mut lookup = HashMap::with_capacity(columns.len());

        for (symbol, raw) in columns {
            if raw.len() != index.len() {
                return Err(DataError::LengthMismatch {
                    symbol,
                    expected: index.len(),
                    actual: raw.len(),
                });
            }
            if lookup.contains_key(&symbol) {
                return Err(DataError::DuplicateAsset(symbol));
            }

            let column = fill_column(&symbol, raw, gap_policy)?;
            lookup.insert(symbol.clone(), assets.len());
            assets.push(symbol);
            filled_columns.push(column);
        }

        Ok(Self {
            assets,
            index,
            columns: filled_columns,
            lookup,
        })
    }

    /// Builds a gap-free panel from dense columns.
    pub fn from_prices(
        index: Vec<DateTime<Utc>>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, DataError> {
        let columns = columns
            .into_iter()
            .map(|(symbol, prices)| (symbol, prices.into_iter().map(Some).collect()))
            .collect();
        Self::new(index, columns, GapPolicy::Reject)
    }

    /// Aligns independently sampled series onto the union of their timestamps.
    ///
    /// Rows where an asset has no observation become gaps and are resolved by
    /// `gap_policy`.
    pub fn from_series(series: Vec<AssetSeries>, gap_policy: GapPolicy) -> Result<Self, DataError> {
        let mut timestamps = BTreeSet::new();
        for s in &series {
            if let Some(pos) = s.points.windows(2).position(|w| w[1].timestamp <= w[0].timestamp) {
                tracing::warn!(symbol = %s.symbol, row = pos + 1, "Series is not strictly increasing.");
                return Err(DataError::UnorderedIndex(pos + 1));
            }
            timestamps.extend(s.points.iter().map(|p| p.timestamp));
        }
        let index: Vec<DateTime<Utc>> = timestamps.into_iter().collect();
        let positions: HashMap<DateTime<Utc>, usize> =
            index.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        let columns = series
            .into_iter()
            .map(|s| {
                let mut column = vec![None; index.len()];
                for point in s.points {
                    column[positions[&point.timestamp]] = Some(point.close);
                }
                (s.symbol, column)
            })
            .collect();

        Self::new(index, columns, gap_policy)
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    /// Number of time steps.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn asset_index(&self, symbol: &str) -> Option<usize> {
        self.lookup.get(symbol).copied()
    }

    pub fn column(&self, asset: usize) -> &[f64] {
        &self.columns[asset]
    }

    pub fn price(&self, time_index: usize, asset: usize) -> f64 {
        self.columns[asset][time_index]
    }

    pub fn timestamp(&self, time_index: usize) -> DateTime<Utc> {
        self.index[time_index]
    }

    /// Resolves the panel columns of a group's assets, in group order.
    pub fn resolve_group(&self, group: &AssetGroup) -> Result<Vec<usize>, DataError> {
        let mut seen = HashSet::new();
        group
            .assets
            .iter()
            .map(|symbol| {
                let column = self
                    .asset_index(symbol)
                    .ok_or_else(|| DataError::UnknownAsset(symbol.clone()))?;
                if !seen.insert(column) {
                    return Err(DataError::DuplicateAsset(symbol.clone()));
                }
                Ok(column)
            })
            .collect()
    }
}

fn fill_column(symbol: &str, raw: Vec<Option<f64>>, gap_policy: GapPolicy) -> Result<Vec<f64>, DataError> {
    let mut column = Vec::with_capacity(raw.len());
    let mut last: Option<f64> = None;
    let mut filled = 0usize;

    for (row, value) in raw.into_iter().enumerate() {
        let price = match (value, gap_policy, last) {
            (Some(price), _, _) => {
                if !(price.is_finite() && price > 0.0) {
                    return Err(DataError::InvalidPrice {
                        symbol: symbol.to_string(),
                        row,
                        price,
                    });
                }
                price
            }
            (None, GapPolicy::ForwardFill, Some(previous)) => {
                filled += 1;
                previous
            }
            (None, _, _) => {
                return Err(DataError::MissingPrice {
                    symbol: symbol.to_string(),
                    row,
                });
            }
        };
        last = Some(price);
        column.push(price);
    }

    if filled > 0 {
        tracing::debug!(symbol, filled, "Forward-filled missing prices.");
    }
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn days(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2021, 1, 4, 0, 0, 0).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    #[test]
    fn rejects_gaps_under_reject_policy() {
        let result = PricePanel::new(
            days(3),
            vec![("A".to_string(), vec![Some(1.0), None, Some(2.0)])],
            GapPolicy::Reject,
        );
        assert!(matches!(result, Err(DataError::MissingPrice { row: 1, .. })));
    }

    #[test]
    fn forward_fills_interior_gaps_but_not_leading_ones() {
        let panel = PricePanel::new(
            days(4),
            vec![("A".to_string(), vec![Some(1.0), None, None, Some(2.0)])],
            GapPolicy::ForwardFill,
        )
        .unwrap();
        assert_eq!(panel.column(0), &[1.0, 1.0, 1.0, 2.0]);

        let leading = PricePanel::new(
            days(2),
            vec![("A".to_string(), vec![None, Some(2.0)])],
            GapPolicy::ForwardFill,
        );
        assert!(matches!(leading, Err(DataError::MissingPrice { row: 0, .. })));
    }

    #[test]
    fn rejects_unordered_index_and_bad_prices() {
        let mut index = days(3);
        index.swap(1, 2);
        assert!(matches!(
            PricePanel::from_prices(index, vec![("A".into(), vec![1.0, 1.0, 1.0])]),
            Err(DataError::UnorderedIndex(_))
        ));
        assert!(matches!(
            PricePanel::from_prices(days(2), vec![("A".into(), vec![1.0, -1.0])]),
            Err(DataError::InvalidPrice { row: 1, .. })
        ));
        assert!(matches!(
            PricePanel::from_prices(days(2), vec![("A".into(), vec![1.0])]),
            Err(DataError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn aligns_series_on_union_index() {
        let t = days(3);
        let series = vec![
            AssetSeries {
                symbol: "A".into(),
                points: vec![
                    PricePoint { timestamp: t[0], close: 10.0 },
                    PricePoint { timestamp: t[1], close: 11.0 },
                    PricePoint { timestamp: t[2], close: 12.0 },
                ],
            },
            AssetSeries {
                symbol: "B".into(),
                points: vec![
                    PricePoint { timestamp: t[0], close: 5.0 },
                    PricePoint { timestamp: t[2], close: 6.0 },
                ],
            },
        ];
        let panel = PricePanel::from_series(series.clone(), GapPolicy::ForwardFill).unwrap();
        assert_eq!(panel.len(), 3);
        assert_eq!(panel.column(1), &[5.0, 5.0, 6.0]);
        assert!(PricePanel::from_series(series, GapPolicy::Reject).is_err());
    }

    #[test]
    fn resolves_groups_and_round_trips_through_json() {
        let panel = PricePanel::from_prices(
            days(2),
            vec![("A".into(), vec![1.0, 2.0]), ("B".into(), vec![3.0, 4.0])],
        )
        .unwrap();
        let group = AssetGroup::new("g", vec!["B".into(), "A".into()]).unwrap();
        assert_eq!(panel.resolve_group(&group).unwrap(), vec![1, 0]);

        let unknown = AssetGroup::new("g", vec!["C".into()]).unwrap();
        assert!(matches!(panel.resolve_group(&unknown), Err(DataError::UnknownAsset(_))));

        let json = serde_json::to_string(&panel).unwrap();
        let back: PricePanel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, panel);
    }
}
