use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

use crate::{config::GatewayConfig, errors::ServiceError};

/// Charge request handed to the external payment processor. Amounts are in
/// minor currency units (cents for USD).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub token: String,
    pub description: String,
}

/// Successful charge acknowledgement from the gateway.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub reference: String,
    pub amount_minor: i64,
}

/// External payment processor. The charge is a monetary side effect outside
/// the database transaction; callers sequence it strictly after local commit.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: ChargeRequest) -> Result<GatewayCharge, ServiceError>;
}

/// Converts a decimal amount into minor currency units for the gateway.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * dec!(100))
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("Amount {} cannot be charged", amount))
        })
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: Option<GatewayErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetails {
    message: Option<String>,
}

/// HTTP client for the charge endpoint of the payment processor.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    endpoint: String,
    secret_key: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("Failed to build gateway client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(amount_minor = request.amount_minor, currency = %request.currency))]
    async fn charge(&self, request: ChargeRequest) -> Result<GatewayCharge, ServiceError> {
        let params = [
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.clone()),
            ("source", request.token.clone()),
            ("description", request.description.clone()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("Charge request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<GatewayErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .and_then(|details| details.message)
                .unwrap_or_else(|| format!("Gateway returned status {}", status));
            return Err(ServiceError::GatewayError(message));
        }

        let charge: ChargeResponse = response.json().await.map_err(|e| {
            ServiceError::GatewayError(format!("Unreadable gateway response: {}", e))
        })?;

        info!(reference = %charge.id, "Gateway charge succeeded");
        Ok(GatewayCharge {
            reference: charge.id,
            amount_minor: request.amount_minor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_amounts_convert_to_minor_units() {
        assert_eq!(to_minor_units(dec!(19.98)).unwrap(), 1998);
        assert_eq!(to_minor_units(dec!(9.99)).unwrap(), 999);
        assert_eq!(to_minor_units(dec!(0)).unwrap(), 0);
        assert_eq!(to_minor_units(dec!(100)).unwrap(), 10000);
    }

    #[test]
    fn sub_cent_amounts_round_to_nearest_cent() {
        assert_eq!(to_minor_units(dec!(1.005)).unwrap(), 101);
        assert_eq!(to_minor_units(dec!(1.004)).unwrap(), 100);
    }
}
