use crate::{config::GatewayConfig, errors::ServiceError};
use hmac::{Hmac, Mac};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

const GATEWAY_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A payment intent opened on the gateway, linked to a local order through
/// the receipt string.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayTransaction {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
struct OpenTransactionRequest<'a> {
    /// Amount in minor currency units (paise)
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

/// Adapter for the remote payment gateway.
///
/// Opens payment intents over HTTP and verifies payment callbacks against
/// the shared key secret. The secret never leaves this process; a valid
/// HMAC signature is the only accepted proof of payment.
#[derive(Clone)]
pub struct PaymentGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl PaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(GATEWAY_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Opens a remote payment intent for `amount` (major currency units) and
    /// returns the gateway-assigned transaction id.
    ///
    /// Rejects non-positive amounts before any network call. Gateway
    /// failures surface as `ExternalServiceError`; the caller's order is
    /// left without a gateway id and stays pending.
    #[instrument(skip(self))]
    pub async fn open_transaction(
        &self,
        amount: Decimal,
        receipt: &str,
    ) -> Result<GatewayTransaction, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::PaymentFailed(
                "Invalid amount provided".to_string(),
            ));
        }

        let amount_minor = (amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| {
                ServiceError::PaymentFailed("Amount out of range".to_string())
            })?;

        let request = OpenTransactionRequest {
            amount: amount_minor,
            currency: &self.config.currency,
            receipt,
            payment_capture: 1,
        };

        let response = self
            .http
            .post(format!("{}/orders", self.config.api_base))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Payment gateway request failed: {}", e);
                ServiceError::ExternalServiceError(format!(
                    "Failed to create payment order: {}",
                    e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Payment gateway returned {}", status);
            return Err(ServiceError::ExternalServiceError(format!(
                "Failed to create payment order: gateway returned {}",
                status
            )));
        }

        let transaction: GatewayTransaction = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!(
                "Failed to parse gateway response: {}",
                e
            ))
        })?;

        info!(
            "Opened gateway transaction {} for receipt {}",
            transaction.id, receipt
        );
        Ok(transaction)
    }

    /// Verifies a payment callback signature.
    ///
    /// Recomputes `HMAC-SHA256(key_secret, "{order_id}|{payment_id}")` and
    /// compares the hex digest to the supplied signature. Pure apart from
    /// logging: marking the order paid is the caller's responsibility.
    pub fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, ServiceError> {
        verify_signature_with_secret(&self.config.key_secret, order_id, payment_id, signature)
    }
}

/// Signature check against an explicit secret.
pub fn verify_signature_with_secret(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<bool, ServiceError> {
    if order_id.is_empty() || payment_id.is_empty() || signature.is_empty() {
        return Err(ServiceError::ValidationError(
            "Missing payment verification parameters".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("hmac init: {}", e)))?;
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    let valid = constant_time_eq(&expected, signature);
    if !valid {
        warn!(
            order_id,
            payment_id, "Payment signature verification failed"
        );
    }

    Ok(valid)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SECRET: &str = "gateway_test_secret";

    fn sign(order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn gateway() -> PaymentGateway {
        PaymentGateway::new(GatewayConfig {
            key_id: "rzp_test_key".into(),
            key_secret: SECRET.into(),
            api_base: "http://localhost:0".into(),
            currency: "INR".into(),
        })
        .unwrap()
    }

    #[test]
    fn valid_signature_is_accepted() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(gateway()
            .verify_signature("order_abc", "pay_xyz", &sig)
            .unwrap());
    }

    #[test]
    fn any_single_character_mutation_is_rejected() {
        let gateway = gateway();
        let sig = sign("order_abc", "pay_xyz");

        for i in 0..sig.len() {
            let mut mutated: Vec<u8> = sig.bytes().collect();
            mutated[i] = if mutated[i] == b'0' { b'1' } else { b'0' };
            let mutated = String::from_utf8(mutated).unwrap();
            if mutated == sig {
                continue;
            }
            assert!(
                !gateway
                    .verify_signature("order_abc", "pay_xyz", &mutated)
                    .unwrap(),
                "mutation at position {} accepted",
                i
            );
        }
    }

    #[test]
    fn signature_for_different_order_is_rejected() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(!gateway()
            .verify_signature("order_other", "pay_xyz", &sig)
            .unwrap());
    }

    #[test]
    fn missing_parameters_are_rejected_not_false() {
        let gateway = gateway();
        let sig = sign("order_abc", "pay_xyz");

        assert!(matches!(
            gateway.verify_signature("", "pay_xyz", &sig),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            gateway.verify_signature("order_abc", "", &sig),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            gateway.verify_signature("order_abc", "pay_xyz", ""),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn truncated_signature_is_rejected() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(!gateway()
            .verify_signature("order_abc", "pay_xyz", &sig[..sig.len() - 1])
            .unwrap());
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected_before_any_request() {
        let gateway = gateway();

        let err = gateway
            .open_transaction(Decimal::ZERO, "order_1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PaymentFailed(_)));

        let err = gateway
            .open_transaction(dec!(-10), "order_1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PaymentFailed(_)));
    }
}
