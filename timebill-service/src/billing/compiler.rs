//! Line items and totals from selected work.

use crate::error::BillingError;
use crate::models::{InvoiceLineItem, Project, WorkItem};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// Result of compiling selected work items.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledInvoice {
    pub line_items: Vec<InvoiceLineItem>,
    /// Exact sum of line amounts, never rounded.
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    /// Earliest and latest creation date of the billed work items.
    pub first_work_date: Option<NaiveDate>,
    pub last_work_date: Option<NaiveDate>,
}

/// Round money to cents, halves away from zero (0.285 -> 0.29).
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// One line per time entry, in work item order then entry order. Amounts
/// are taken as stored on the entry; the rate is only checked to still
/// exist on the owning project.
pub fn compile(
    work_items: &[WorkItem],
    projects: &[Project],
    tax_rate: Decimal,
) -> Result<CompiledInvoice, BillingError> {
    if tax_rate.is_sign_negative() {
        return Err(BillingError::Validation(format!(
            "tax rate must not be negative, got {tax_rate}"
        )));
    }

    let mut line_items = Vec::new();
    let mut subtotal = Decimal::ZERO;
    let mut first_work_date: Option<NaiveDate> = None;
    let mut last_work_date: Option<NaiveDate> = None;

    for work_item in work_items {
        let project = projects.iter().find(|p| p.id == work_item.project_id);
        let work_date = work_item.created_at.date_naive();

        for entry in &work_item.time_entries {
            if project.and_then(|p| p.rate(&entry.rate_name)).is_none() {
                return Err(BillingError::InvalidRate {
                    project_id: work_item.project_id.clone(),
                    rate_name: entry.rate_name.clone(),
                });
            }

            line_items.push(InvoiceLineItem {
                description: format!(
                    "{}: {} (Rate: {})",
                    work_date.format("%Y-%m-%d"),
                    work_item.name,
                    entry.rate_name
                ),
                quantity: entry.duration,
                unit_price: entry.price_per_hour,
                amount: entry.amount,
                work_item_ids: vec![work_item.id.clone()],
            });
            subtotal = subtotal.checked_add(entry.amount).ok_or_else(|| {
                overflow(format!("subtotal after work item {}", work_item.id))
            })?;

            first_work_date = Some(first_work_date.map_or(work_date, |d| d.min(work_date)));
            last_work_date = Some(last_work_date.map_or(work_date, |d| d.max(work_date)));
        }
    }

    let tax_amount = subtotal
        .checked_mul(tax_rate)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .map(round_money)
        .ok_or_else(|| overflow(format!("tax at {tax_rate}% on {subtotal}")))?;
    let total_amount = subtotal
        .checked_add(tax_amount)
        .map(round_money)
        .ok_or_else(|| overflow(format!("total of {subtotal} plus {tax_amount}")))?;

    Ok(CompiledInvoice {
        line_items,
        subtotal,
        tax_amount,
        total_amount,
        first_work_date,
        last_work_date,
    })
}

fn overflow(what: String) -> BillingError {
    BillingError::Validation(format!("amount out of range: {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rate, TimeEntry, WorkItemStatus};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn project(rates: Vec<Rate>) -> Project {
        Project {
            id: "p1".into(),
            user_id: "u1".into(),
            name: "Website".into(),
            client_id: "c1".into(),
            description: None,
            status: Default::default(),
            rates,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn entry(rate: &str, hours: Decimal, price: Decimal) -> TimeEntry {
        TimeEntry {
            description: "work".into(),
            rate_name: rate.into(),
            duration: hours,
            price_per_hour: price,
            amount: hours * price,
        }
    }

    fn work_item(id: &str, day: u32, entries: Vec<TimeEntry>) -> WorkItem {
        let created = Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap();
        WorkItem {
            id: id.into(),
            user_id: "u1".into(),
            name: format!("Task {id}"),
            description: None,
            project_id: "p1".into(),
            status: WorkItemStatus::Created,
            invoice_id: None,
            time_entries: entries,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn half_cents_round_away_from_zero() {
        assert_eq!(round_money(dec!(0.285)), dec!(0.29));
        assert_eq!(round_money(dec!(0.275)), dec!(0.28));
        assert_eq!(round_money(dec!(0.284)), dec!(0.28));
        assert_eq!(round_money(dec!(-0.285)), dec!(-0.29));
    }

    #[test]
    fn tax_on_small_subtotal_uses_half_up() {
        let projects = vec![project(vec![Rate::new("Std", dec!(1.50))])];
        let items = vec![work_item("a", 1, vec![entry("Std", dec!(1), dec!(1.50))])];

        let compiled = compile(&items, &projects, dec!(19)).unwrap();

        assert_eq!(compiled.subtotal, dec!(1.50));
        assert_eq!(compiled.tax_amount, dec!(0.29));
        assert_eq!(compiled.total_amount, dec!(1.79));
    }

    #[test]
    fn subtotal_is_exact_sum_of_lines() {
        let projects = vec![project(vec![Rate::new("Odd", dec!(33.333))])];
        let items = vec![
            work_item("a", 3, vec![entry("Odd", dec!(1.5), dec!(33.333))]),
            work_item("b", 1, vec![entry("Odd", dec!(0.25), dec!(33.333))]),
        ];

        let compiled = compile(&items, &projects, dec!(7)).unwrap();

        let sum: Decimal = compiled.line_items.iter().map(|l| l.amount).sum();
        assert_eq!(compiled.subtotal, sum);
        assert_eq!(compiled.subtotal, dec!(58.33275));
        assert_eq!(compiled.tax_amount, round_money(sum * dec!(0.07)));
        assert_eq!(
            compiled.total_amount,
            round_money(compiled.subtotal + compiled.tax_amount)
        );
        assert_eq!(
            compiled.first_work_date,
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
        assert_eq!(compiled.last_work_date, NaiveDate::from_ymd_opt(2024, 5, 3));
    }

    #[test]
    fn line_description_names_date_item_and_rate() {
        let projects = vec![project(vec![Rate::new("Senior", dec!(120))])];
        let items = vec![work_item("a", 7, vec![entry("Senior", dec!(2), dec!(120))])];

        let compiled = compile(&items, &projects, dec!(19)).unwrap();

        let line = &compiled.line_items[0];
        assert_eq!(line.description, "2024-05-07: Task a (Rate: Senior)");
        assert_eq!(line.quantity, dec!(2));
        assert_eq!(line.unit_price, dec!(120));
        assert_eq!(line.work_item_ids, vec!["a".to_string()]);
    }

    #[test]
    fn stale_rate_name_is_rejected() {
        let projects = vec![project(vec![Rate::new("Senior", dec!(120))])];
        let items = vec![work_item("a", 1, vec![entry("Junior", dec!(1), dec!(80))])];

        let err = compile(&items, &projects, dec!(19)).unwrap_err();
        assert!(matches!(err, BillingError::InvalidRate { ref rate_name, .. } if rate_name == "Junior"));
    }

    #[test]
    fn missing_project_is_an_invalid_rate() {
        let items = vec![work_item("a", 1, vec![entry("Senior", dec!(1), dec!(120))])];
        let err = compile(&items, &[], dec!(19)).unwrap_err();
        assert!(matches!(err, BillingError::InvalidRate { .. }));
    }

    #[test]
    fn oversized_amounts_are_rejected_not_overflowed() {
        let projects = vec![project(vec![Rate::new("Std", dec!(120))])];

        let items = vec![work_item("a", 1, vec![entry("Std", dec!(2), dec!(120))])];
        let err = compile(&items, &projects, Decimal::MAX).unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));

        let huge = TimeEntry {
            amount: Decimal::MAX,
            ..entry("Std", dec!(1), dec!(120))
        };
        let items = vec![work_item("a", 1, vec![huge.clone(), huge])];
        let err = compile(&items, &projects, dec!(19)).unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    #[test]
    fn negative_tax_rate_is_rejected() {
        let err = compile(&[], &[], dec!(-1)).unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }
}
