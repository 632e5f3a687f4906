use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::ImportError;
use crate::scoring::domain::{parse_temporal, TemporalValue};
use crate::scoring::{Lead, LeadId, LeadPriority, LeadSource, LeadStatus};

/// Parse a CRM lead export. Blank cells are treated as absent attributes and
/// tags are `;`-separated.
pub fn parse_leads<R: Read>(reader: R) -> Result<Vec<Lead>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut leads = Vec::new();

    for record in csv_reader.deserialize::<LeadRow>() {
        let row = record?;
        leads.push(row.into_lead()?);
    }

    Ok(leads)
}

pub fn leads_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Lead>, ImportError> {
    let file = std::fs::File::open(path)?;
    parse_leads(file)
}

#[derive(Debug, Deserialize)]
struct LeadRow {
    id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
    #[serde(default)]
    company: String,
    source: String,
    status: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    priority: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    tags: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    budget: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    interaction_count: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    last_interaction: Option<String>,
}

impl LeadRow {
    fn into_lead(self) -> Result<Lead, ImportError> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err(invalid(&id, "lead id must not be blank"));
        }

        let source = LeadSource::from_label(&self.source)
            .ok_or_else(|| invalid(&id, format!("unknown source '{}'", self.source)))?;
        let status = LeadStatus::from_label(&self.status)
            .ok_or_else(|| invalid(&id, format!("unknown status '{}'", self.status)))?;
        let priority = self
            .priority
            .as_deref()
            .map(|raw| {
                LeadPriority::from_label(raw)
                    .ok_or_else(|| invalid(&id, format!("unknown priority '{raw}'")))
            })
            .transpose()?;

        let budget = self
            .budget
            .as_deref()
            .map(|raw| {
                raw.replace(',', "")
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| invalid(&id, format!("budget '{raw}' is not a number")))
            })
            .transpose()?;

        let interaction_count = self
            .interaction_count
            .as_deref()
            .map(|raw| {
                raw.parse::<u32>().map_err(|_| {
                    invalid(&id, format!("interaction count '{raw}' is not a count"))
                })
            })
            .transpose()?
            .unwrap_or(0);

        let last_interaction = self
            .last_interaction
            .as_deref()
            .map(|raw| {
                parse_timestamp(raw)
                    .ok_or_else(|| invalid(&id, format!("last interaction '{raw}' is not a date")))
            })
            .transpose()?;

        let tags: BTreeSet<String> = self
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect();

        Ok(Lead {
            id: LeadId(id),
            name: self.name,
            company: self.company,
            source,
            status,
            priority,
            tags,
            budget,
            interaction_count,
            last_interaction,
            score: None,
            score_breakdown: Vec::new(),
        })
    }
}

fn invalid(id: &str, message: impl Into<String>) -> ImportError {
    ImportError::InvalidRow {
        lead: id.to_string(),
        message: message.into(),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_temporal(raw).map(TemporalValue::instant)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str =
        "id,name,company,source,status,priority,tags,budget,interaction_count,last_interaction\n";

    #[test]
    fn parses_full_rows() {
        let csv = format!(
            "{HEADER}lead-1,Dana Whitfield,Acme Corp,trade show,Qualified,High,referral; vip ,\"12,500\",4,2025-03-14T16:45:00Z\n"
        );

        let leads = parse_leads(Cursor::new(csv)).expect("csv parses");

        assert_eq!(leads.len(), 1);
        let lead = &leads[0];
        assert_eq!(lead.id, LeadId("lead-1".to_string()));
        assert_eq!(lead.source, LeadSource::TradeShow);
        assert_eq!(lead.priority, Some(LeadPriority::High));
        assert_eq!(
            lead.tags.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["referral", "vip"]
        );
        assert_eq!(lead.budget, Some(12_500.0));
        assert_eq!(lead.interaction_count, 4);
        assert!(lead.last_interaction.is_some());
    }

    #[test]
    fn blank_cells_are_absent() {
        let csv = format!("{HEADER}lead-2,,Globex,Website,New,,,,,\n");

        let leads = parse_leads(Cursor::new(csv)).expect("csv parses");

        let lead = &leads[0];
        assert_eq!(lead.name, None);
        assert!(lead.tags.is_empty());
        assert_eq!(lead.budget, None);
        assert_eq!(lead.interaction_count, 0);
        assert_eq!(lead.last_interaction, None);
    }

    #[test]
    fn date_only_interactions_start_at_midnight() {
        let csv = format!("{HEADER}lead-3,,Initech,Referral,Contacted,,,,1,2025-01-31\n");

        let leads = parse_leads(Cursor::new(csv)).expect("csv parses");

        assert_eq!(
            leads[0].last_interaction.map(|at| at.to_rfc3339()),
            Some("2025-01-31T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn unknown_labels_are_reported_with_lead_id() {
        let csv = format!("{HEADER}lead-4,,Hooli,Billboard,New,,,,,\n");

        let error = parse_leads(Cursor::new(csv)).expect_err("unknown source");

        match error {
            ImportError::InvalidRow { lead, message } => {
                assert_eq!(lead, "lead-4");
                assert!(message.contains("Billboard"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_numeric_budget_is_rejected() {
        let csv = format!("{HEADER}lead-5,,Umbrella,Webinar,Lost,,,lots,,\n");

        assert!(matches!(
            parse_leads(Cursor::new(csv)),
            Err(ImportError::InvalidRow { .. })
        ));
    }
}
