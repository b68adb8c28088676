//! Invoice email composition.

use crate::config::IssuerDetails;
use crate::error::BillingError;
use crate::models::{EmailContent, EmailTemplateRequest, Invoice};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

const DEFAULT_SUBJECT: &str = "Invoice [Invoice Number]";

const DEFAULT_BODY: &str = "Dear [Client Name],\n\n\
please find attached invoice [Invoice Number] for [Total Amount], \
payable by [Due Date].\n\n\
[Your Bank Details]\n\n\
Kind regards,\n\
[Your Name]";

/// Produces subject, body and recipient for an invoice email.
#[async_trait]
pub trait EmailComposer: Send + Sync {
    async fn compose(
        &self,
        invoice: &Invoice,
        request: &EmailTemplateRequest,
        issuer: &IssuerDetails,
    ) -> Result<EmailContent, BillingError>;
}

/// Bracket-placeholder templating, e.g. `[Invoice Number]`.
pub struct TemplateEmailComposer {
    currency: String,
}

impl TemplateEmailComposer {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    fn fill(&self, template: &str, invoice: &Invoice, issuer: &IssuerDetails) -> String {
        let placeholders = [
            ("[Client Name]", invoice.client_snapshot.name.clone()),
            ("[Invoice Number]", invoice.invoice_number.clone()),
            (
                "[Total Amount]",
                format_currency(invoice.total_amount, &self.currency),
            ),
            ("[Issue Date]", format_date(invoice.issue_date)),
            ("[Due Date]", format_date(invoice.due_date)),
            ("[Your Name]", issuer.name.clone()),
            ("[Your Bank Details]", issuer.bank_details()),
        ];
        placeholders
            .iter()
            .fold(template.to_string(), |text, (key, value)| {
                text.replace(key, value)
            })
    }
}

#[async_trait]
impl EmailComposer for TemplateEmailComposer {
    async fn compose(
        &self,
        invoice: &Invoice,
        request: &EmailTemplateRequest,
        issuer: &IssuerDetails,
    ) -> Result<EmailContent, BillingError> {
        let recipient = request
            .recipient_email
            .clone()
            .or_else(|| invoice.client_snapshot.email.clone())
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| {
                BillingError::Validation(format!(
                    "no recipient for invoice {}: client has no email",
                    invoice.invoice_number
                ))
            })?;

        let subject = self.fill(
            request.subject.as_deref().unwrap_or(DEFAULT_SUBJECT),
            invoice,
            issuer,
        );
        let body = self.fill(
            request.body_template.as_deref().unwrap_or(DEFAULT_BODY),
            invoice,
            issuer,
        );

        tracing::info!(
            invoice_number = %invoice.invoice_number,
            "Email content composed"
        );

        Ok(EmailContent {
            subject,
            body,
            recipient,
        })
    }
}

/// German money format: `1.234,56 €`.
pub fn format_currency(value: Decimal, currency: &str) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let plain = format!("{:.2}", rounded.abs());
    let (whole, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped},{fraction} {currency}")
}

/// `dd.mm.yyyy`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn formats_currency_german_style() {
        assert_eq!(format_currency(dec!(856.8), "€"), "856,80 €");
        assert_eq!(format_currency(dec!(1234.56), "€"), "1.234,56 €");
        assert_eq!(format_currency(dec!(1234567.005), "€"), "1.234.567,01 €");
        assert_eq!(format_currency(dec!(0), "€"), "0,00 €");
        assert_eq!(format_currency(dec!(-42.5), "EUR"), "-42,50 EUR");
    }

    #[test]
    fn formats_date_day_first() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(format_date(date), "07.03.2024");
    }
}
