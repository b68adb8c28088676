use rust_decimal::Decimal;
use serde::Serialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct TimebillConfig {
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub billing: BillingConfig,
    pub issuer: IssuerDetails,
    pub pdf: PdfConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

/// Invoice defaults applied when a request leaves them out.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub invoice_number_prefix: String,
    /// Percent.
    pub default_tax_rate: Decimal,
    pub default_due_days: u32,
    pub currency: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            invoice_number_prefix: "RE-".to_string(),
            default_tax_rate: Decimal::from(19),
            default_due_days: 14,
            currency: "€".to_string(),
        }
    }
}

/// The invoicing business, as printed on every invoice and email.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssuerDetails {
    pub name: String,
    pub address_line1: String,
    pub zip_city: String,
    pub tax_id: String,
    pub vat_id: String,
    pub bank_holder: String,
    pub bank_iban: String,
    pub bank_bic: String,
    pub bank_name: String,
}

impl IssuerDetails {
    /// Multi-line bank block used in email bodies.
    pub fn bank_details(&self) -> String {
        format!(
            "Kontoinhaber: {}\nIBAN: {}\nBIC: {}\nBank: {}",
            self.bank_holder, self.bank_iban, self.bank_bic, self.bank_name
        )
    }
}

#[derive(Debug, Clone)]
pub struct PdfConfig {
    /// Rendering service URL. Without it PDFs cannot be produced.
    pub renderer_endpoint: Option<String>,
    pub render_timeout_secs: u64,
    pub worker_enabled: bool,
    pub worker_count: usize,
    pub queue_size: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            renderer_endpoint: None,
            render_timeout_secs: 30,
            worker_enabled: true,
            worker_count: 2,
            queue_size: 100,
        }
    }
}

impl TimebillConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";
        let defaults = BillingConfig::default();
        let pdf_defaults = PdfConfig::default();

        Ok(TimebillConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("timebill_db"), is_prod)?,
            },
            billing: BillingConfig {
                invoice_number_prefix: get_env(
                    "INVOICE_NUMBER_PREFIX",
                    Some(&defaults.invoice_number_prefix),
                    false,
                )?,
                default_tax_rate: parse_env("DEFAULT_TAX_RATE", "19.0")?,
                default_due_days: parse_env("DEFAULT_DUE_DAYS", "14")?,
                currency: get_env("INVOICE_CURRENCY", Some(&defaults.currency), false)?,
            },
            issuer: IssuerDetails {
                name: get_env("ISSUER_NAME", Some(""), is_prod)?,
                address_line1: get_env("ISSUER_ADDRESS_LINE1", Some(""), is_prod)?,
                zip_city: get_env("ISSUER_ZIP_CITY", Some(""), is_prod)?,
                tax_id: get_env("ISSUER_TAX_ID", Some(""), is_prod)?,
                vat_id: get_env("ISSUER_VAT_ID", Some(""), false)?,
                bank_holder: get_env("ISSUER_BANK_HOLDER", Some(""), is_prod)?,
                bank_iban: get_env("ISSUER_BANK_IBAN", Some(""), is_prod)?,
                bank_bic: get_env("ISSUER_BANK_BIC", Some(""), is_prod)?,
                bank_name: get_env("ISSUER_BANK_NAME", Some(""), is_prod)?,
            },
            pdf: PdfConfig {
                renderer_endpoint: env::var("PDF_RENDERER_ENDPOINT").ok(),
                render_timeout_secs: parse_env(
                    "PDF_RENDER_TIMEOUT_SECS",
                    &pdf_defaults.render_timeout_secs.to_string(),
                )?,
                worker_enabled: parse_env("PDF_WORKER_ENABLED", "true")?,
                worker_count: parse_env("PDF_WORKER_COUNT", &pdf_defaults.worker_count.to_string())?,
                queue_size: parse_env("PDF_QUEUE_SIZE", &pdf_defaults.queue_size.to_string())?,
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), false)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", key, e)))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_falls_back_to_default() {
        let rate: Decimal = parse_env("TIMEBILL_TEST_UNSET_RATE", "19.0").unwrap();
        assert_eq!(rate, Decimal::new(190, 1));
        let days: u32 = parse_env("TIMEBILL_TEST_UNSET_DAYS", "14").unwrap();
        assert_eq!(days, 14);
    }

    #[test]
    fn parse_env_rejects_garbage_default() {
        let result: Result<u32, _> = parse_env("TIMEBILL_TEST_UNSET_COUNT", "two");
        assert!(result.is_err());
    }

    #[test]
    fn missing_required_key_without_default_errors() {
        assert!(get_env("TIMEBILL_TEST_UNSET_REQUIRED", None, false).is_err());
        assert!(get_env("TIMEBILL_TEST_UNSET_REQUIRED", Some("x"), true).is_err());
    }
}
