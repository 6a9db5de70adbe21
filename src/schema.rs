//! Declarative description of the workbook layout.
//!
//! The renderer walks this schema; adding a column means adding an entry
//! here and (if it is a new datum) a `FundRecord::field` arm.

/// Conditional formatting applied to a whole data column.
#[derive(Debug, Clone, Copy)]
pub enum ConditionalRule {
    /// Fill color per exact cell text.
    FillMap(&'static [(&'static str, u32)]),
    /// Three-color scale over the column's numeric percentiles.
    Percentile { start: u32, mid: u32, end: u32 },
}

/// Red to amber to green: higher is better.
pub const GOOD_HIGH: ConditionalRule = ConditionalRule::Percentile {
    start: 0x610000,
    mid: 0x946A00,
    end: 0x005E23,
};

/// Green to amber to red: lower is better.
pub const GOOD_LOW: ConditionalRule = ConditionalRule::Percentile {
    start: 0x005E23,
    mid: 0x946A00,
    end: 0x610000,
};

const REGION_FILLS: &[(&str, u32)] = &[
    ("Amérique du Nord", 0xA13320),
    ("Asie-Pacifique", 0x560F75),
    ("Europe", 0x336BD4),
    ("Eurozone", 0x0E307D),
];

const CURRENCY_FILLS: &[(&str, u32)] = &[("Dollar", 0xA13320)];

#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// `FundRecord::field` reference.
    pub key: &'static str,
    pub title: &'static str,
    /// Fixed width in characters; measured from content when absent.
    pub width: Option<f64>,
    pub format: Option<ConditionalRule>,
}

impl Column {
    const fn plain(key: &'static str, title: &'static str) -> Self {
        Column {
            key,
            title,
            width: None,
            format: None,
        }
    }

    const fn wide(key: &'static str, title: &'static str, width: f64) -> Self {
        Column {
            key,
            title,
            width: Some(width),
            format: None,
        }
    }

    const fn scaled(
        key: &'static str,
        title: &'static str,
        width: Option<f64>,
        rule: ConditionalRule,
    ) -> Self {
        Column {
            key,
            title,
            width,
            format: Some(rule),
        }
    }
}

/// A merged header spanning a run of columns.
#[derive(Debug, Clone, Copy)]
pub struct ColumnGroup {
    pub title: &'static str,
    pub columns: &'static [Column],
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSchema {
    pub groups: &'static [ColumnGroup],
}

impl ColumnSchema {
    pub fn columns(&self) -> impl Iterator<Item = &'static Column> + '_ {
        self.groups.iter().flat_map(|g| g.columns.iter())
    }

    pub fn column_count(&self) -> usize {
        self.groups.iter().map(|g| g.columns.len()).sum()
    }
}

/// The fund comparison sheet, left to right.
pub fn workbook_schema() -> ColumnSchema {
    const IDENTITY: &[Column] = &[
        Column::wide("favorite", "⭐", 3.0),
        Column::wide("isin", "ISIN", 14.0),
    ];

    const OVERVIEW: &[Column] = &[
        Column::plain("asset_class", "Asset\nclass"),
        Column::scaled(
            "asset_region_class",
            "Asset\nregion",
            None,
            ConditionalRule::FillMap(REGION_FILLS),
        ),
        Column::wide("fundshare_id", "Fund\nid", 6.0),
        Column::plain("legal_name", "Legal\nname"),
        Column::plain("legal_form", "Legal\nform"),
        Column::plain("creation_date", "Creation\ndate"),
        Column::plain("share_type", "Share\ntype"),
        Column::plain("share_size", "Share\nsize"),
        Column::plain("share_vl", "Share\nNAV"),
        Column::scaled(
            "currency",
            "Currency",
            None,
            ConditionalRule::FillMap(CURRENCY_FILLS),
        ),
        Column::plain("base_index", "Base\nindex"),
        Column::scaled("sri_risk", "SRI\nrisk", Some(6.0), GOOD_LOW),
        Column::scaled("morning_star", "Morning\nstar", Some(6.0), GOOD_HIGH),
        Column::scaled("q_notation", "Quantalys\nrating", Some(6.0), GOOD_HIGH),
        Column::wide("pea", "PEA", 6.0),
        Column::wide("policy", "Investment policy", 40.0),
        Column::plain("source_details", "Source"),
    ];

    const PERFORMANCE: &[Column] = &[
        Column::scaled("perf_cumulated", "Cumulated\n(5 years)", Some(10.0), GOOD_HIGH),
        Column::scaled(
            "perf_cumulated_diff",
            "Versus index\n(5 years)",
            Some(10.0),
            GOOD_HIGH,
        ),
        Column::scaled("volatility", "Volatility", Some(8.0), GOOD_LOW),
        Column::scaled("sharpe_ratio", "Sharpe\nratio", Some(8.0), GOOD_HIGH),
        Column::plain("dic_details", "Key info\ndocument"),
        Column::plain("more_details", "Details"),
    ];

    const SCENARIOS: &[Column] = &[
        Column::scaled("scenario_stressed", "Stressed", Some(6.0), GOOD_HIGH),
        Column::scaled("scenario_unfavorable", "Unfavorable", Some(6.0), GOOD_HIGH),
        Column::scaled("scenario_moderate", "Moderate", Some(6.0), GOOD_HIGH),
        Column::scaled("scenario_favorable", "Favorable", Some(6.0), GOOD_HIGH),
    ];

    const PORTFOLIO: &[Column] = &[
        Column::plain("portfolio_holdings", "Main\nholdings"),
        Column::plain("portfolio_currencies", "By\ncurrency"),
        Column::plain("portfolio_sectors", "By\nsector"),
        Column::plain("portfolio_countries", "By\ncountry"),
    ];

    const FEES: &[Column] = &[
        Column::scaled("fee_conversion_rate", "Conversion\nrate", Some(6.0), GOOD_LOW),
        Column::scaled("fee_ongoing_charges", "Ongoing\ncharges", Some(6.0), GOOD_LOW),
        Column::scaled(
            "fee_maximum_subscription",
            "Subscription\n(max)",
            Some(6.0),
            GOOD_LOW,
        ),
        Column::scaled(
            "fee_maximum_redemption",
            "Redemption\n(max)",
            Some(6.0),
            GOOD_LOW,
        ),
        Column::scaled("fee_real_ongoing", "Ongoing\n(real)", Some(6.0), GOOD_LOW),
        Column::scaled(
            "fee_redemption_acquired",
            "Redemption\nacquired",
            Some(6.0),
            GOOD_LOW,
        ),
        Column::scaled(
            "fee_maximum_management",
            "Management\n(max)",
            Some(6.0),
            GOOD_LOW,
        ),
    ];

    const GROUPS: &[ColumnGroup] = &[
        ColumnGroup {
            title: "",
            columns: IDENTITY,
        },
        ColumnGroup {
            title: "Overview",
            columns: OVERVIEW,
        },
        ColumnGroup {
            title: "Performance",
            columns: PERFORMANCE,
        },
        ColumnGroup {
            title: "5-year scenarios",
            columns: SCENARIOS,
        },
        ColumnGroup {
            title: "Portfolio",
            columns: PORTFOLIO,
        },
        ColumnGroup {
            title: "Fees",
            columns: FEES,
        },
    ];

    ColumnSchema { groups: GROUPS }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_column_keys_are_unique() {
        let schema = workbook_schema();
        let mut seen = HashSet::new();
        for column in schema.columns() {
            assert!(seen.insert(column.key), "duplicate column key {}", column.key);
        }
    }

    #[test]
    fn test_column_count_matches_flattened_iteration() {
        let schema = workbook_schema();
        assert_eq!(schema.column_count(), schema.columns().count());
        assert_eq!(schema.groups[0].columns[1].key, "isin");
    }

    #[test]
    fn test_favorite_column_titled_with_star() {
        let schema = workbook_schema();
        assert_eq!(schema.groups[0].columns[0].key, "favorite");
        assert_eq!(schema.groups[0].columns[0].title, "⭐");
    }

    #[test]
    fn test_fund_id_column_in_overview() {
        let schema = workbook_schema();
        let column = schema
            .columns()
            .find(|c| c.key == "fundshare_id")
            .expect("fund id column missing");
        assert_eq!(column.width, Some(6.0));
        let overview = &schema.groups[1];
        assert_eq!(overview.title, "Overview");
        assert!(overview.columns.iter().any(|c| c.key == "fundshare_id"));
    }

    #[test]
    fn test_fee_columns_prefer_low_values() {
        let schema = workbook_schema();
        let fees = schema.groups.last().unwrap();
        assert_eq!(fees.title, "Fees");
        for column in fees.columns {
            assert!(matches!(
                column.format,
                Some(ConditionalRule::Percentile { start: 0x005E23, .. })
            ));
        }
    }
}
