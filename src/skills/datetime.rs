//! Datetime capability: current time in a named timezone

use super::BuiltinSkill;
use crate::capability::{
    parse_args, Capability, CapabilityContext, CapabilityError, Operation, OperationError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const MANIFEST: &str = include_str!("manifests/datetime.md");

/// City names people actually type, mapped to IANA zones
const CITY_ALIASES: &[(&str, &str)] = &[
    ("buenos aires", "America/Argentina/Buenos_Aires"),
    ("argentina", "America/Argentina/Buenos_Aires"),
    ("new york", "America/New_York"),
    ("los angeles", "America/Los_Angeles"),
    ("london", "Europe/London"),
    ("paris", "Europe/Paris"),
    ("berlin", "Europe/Berlin"),
    ("tokyo", "Asia/Tokyo"),
    ("sydney", "Australia/Sydney"),
    ("dubai", "Asia/Dubai"),
    ("singapore", "Asia/Singapore"),
    ("hong kong", "Asia/Hong_Kong"),
    ("moscow", "Europe/Moscow"),
    ("sao paulo", "America/Sao_Paulo"),
    ("mexico city", "America/Mexico_City"),
    ("utc", "UTC"),
];

pub(super) fn build(_ctx: &CapabilityContext) -> Result<Arc<dyn Capability>, CapabilityError> {
    BuiltinSkill::new("datetime", MANIFEST, vec![Arc::new(GetDatetime)])
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Format {
    #[default]
    Full,
    Date,
    Time,
}

impl Format {
    fn pattern(self) -> &'static str {
        match self {
            Format::Full => "%A, %-d %B %Y, %H:%M:%S %Z",
            Format::Date => "%-d %B %Y",
            Format::Time => "%H:%M:%S",
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Deserialize)]
struct DatetimeArgs {
    #[serde(default = "default_timezone")]
    timezone: String,
    #[serde(default)]
    format: Format,
}

fn resolve_timezone(input: &str) -> &str {
    let lowered = input.trim().to_lowercase();
    CITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map_or(input.trim(), |&(_, zone)| zone)
}

fn format_at(now: DateTime<Utc>, timezone: &str, format: Format) -> Result<String, String> {
    let zone = resolve_timezone(timezone);
    let tz: Tz = zone
        .parse()
        .map_err(|_| format!("unknown timezone '{zone}'"))?;
    let local = now.with_timezone(&tz);
    Ok(format!("{} ({zone})", local.format(format.pattern())))
}

struct GetDatetime;

#[async_trait]
impl Operation for GetDatetime {
    fn name(&self) -> &str {
        "get_datetime"
    }

    fn description(&self) -> &str {
        "Get the current date and time in a specific timezone. Use city names like \"Tokyo\", \"London\", \"Buenos Aires\" or IANA timezone identifiers."
    }

    fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "timezone": {
                    "type": "string",
                    "description": "Timezone name (city) or IANA identifier, e.g. \"Tokyo\", \"America/New_York\"",
                    "default": "UTC"
                },
                "format": {
                    "type": "string",
                    "enum": ["full", "date", "time"],
                    "description": "Output format: full (date and time), date only, or time only",
                    "default": "full"
                }
            }
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, OperationError> {
        let DatetimeArgs { timezone, format } = parse_args(args)?;
        Ok(format_at(Utc::now(), &timezone, format).unwrap_or_else(|e| {
            format!("Error getting datetime: {e}. Make sure the timezone is valid.")
        }))
    }
}
