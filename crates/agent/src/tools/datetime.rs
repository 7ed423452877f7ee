//! Date and time capabilities.

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{Duration, Local, Months, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use super::ToolTrait;

const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time, optionally with a custom strftime format
pub struct CurrentTimeTool;

#[derive(Deserialize)]
struct CurrentTimeArgs {
    format: Option<String>,
}

#[async_trait]
impl ToolTrait for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }
    fn description(&self) -> &str {
        "Get the current date and time. Optional strftime format, default %Y-%m-%d %H:%M:%S."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "format": { "type": "string", "description": "strftime format string" }
            },
            "required": []
        })
    }
    async fn execute(
        &self,
        args: serde_json::Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let args: CurrentTimeArgs = serde_json::from_value(args)?;
        let format = args.format.as_deref().unwrap_or(DEFAULT_FORMAT);

        // Reject bad format strings up front; rendering one would panic
        let items: Vec<Item> = StrftimeItems::new(format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Ok(format!("Invalid time format: {}", format));
        }

        Ok(Local::now().format_with_items(items.into_iter()).to_string())
    }
}

/// Date arithmetic: add or subtract days, months, and years
pub struct DateCalculatorTool;

#[derive(Deserialize)]
struct DateCalculatorArgs {
    date: String,
    #[serde(default)]
    days: i64,
    #[serde(default)]
    months: i32,
    #[serde(default)]
    years: i32,
}

#[async_trait]
impl ToolTrait for DateCalculatorTool {
    fn name(&self) -> &str {
        "date_calculator"
    }
    fn description(&self) -> &str {
        "Add or subtract days, months, and years from a base date (YYYY-MM-DD)."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "date": { "type": "string", "description": "Base date, YYYY-MM-DD" },
                "days": { "type": "integer", "description": "Days to add (may be negative)" },
                "months": { "type": "integer", "description": "Months to add (may be negative)" },
                "years": { "type": "integer", "description": "Years to add (may be negative)" }
            },
            "required": ["date"]
        })
    }
    async fn execute(
        &self,
        args: serde_json::Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let args: DateCalculatorArgs = serde_json::from_value(args)?;

        let base = match NaiveDate::parse_from_str(&args.date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => return Ok(format!("Invalid date (expected YYYY-MM-DD): {}", args.date)),
        };

        let total_months = args.years as i64 * 12 + args.months as i64;
        let shifted = if total_months >= 0 {
            base.checked_add_months(Months::new(total_months as u32))
        } else {
            base.checked_sub_months(Months::new((-total_months) as u32))
        };
        let Some(shifted) = shifted else {
            return Ok("Date out of range".to_string());
        };

        let Some(result) = shifted.checked_add_signed(Duration::days(args.days)) else {
            return Ok("Date out of range".to_string());
        };

        Ok(result.format("%Y-%m-%d").to_string())
    }
}
