use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde_json::json;
use sqlx::PgPool;
use url::Url;

use crate::models::{
    CreateNotificationData, Notification, Order, Profile, Role, Ticket, WalletMovement,
};

#[derive(thiserror::Error, Debug)]
pub enum EmailError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid email endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Email API error: {0}")]
    ApiError(String),
}

/// Client for the transactional email API. The provider resolves templates
/// server-side; we post the template name, the recipient and the merge data.
#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    base_url: Url,
    api_key: Secret<String>,
}

impl EmailClient {
    pub fn new(base_url: Url, api_key: Secret<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    pub async fn send(
        &self,
        recipient: &str,
        template: &str,
        data: serde_json::Value,
    ) -> Result<(), EmailError> {
        let url = self.base_url.join("v1/messages")?;

        tracing::debug!(template = %template, "Sending transactional email");

        let response = self
            .client
            .post(url)
            .header("x-api-key", self.api_key.expose_secret())
            .json(&json!({
                "to": recipient,
                "template": template,
                "data": data,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Email API request failed");
            return Err(EmailError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        Ok(())
    }

    /// Lightweight reachability probe for the health endpoint.
    pub async fn probe(&self) -> Result<(), EmailError> {
        let url = self.base_url.join("v1/health")?;
        self.client
            .get(url)
            .header("x-api-key", self.api_key.expose_secret())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Fans each marketplace event out to an in-app notification row and, when
/// configured, a transactional email. Delivery is best effort: failures are
/// logged and swallowed so they can never roll back a financial write.
#[derive(Clone)]
pub struct Notifier {
    pool: PgPool,
    email: Option<EmailClient>,
}

impl Notifier {
    pub fn new(pool: PgPool, email: Option<EmailClient>) -> Self {
        Self { pool, email }
    }

    async fn deliver(&self, recipient: &Profile, template: &str, data: CreateNotificationData) {
        let merge_data = data.metadata.clone().unwrap_or_else(|| json!({}));

        if let Err(e) = Notification::create(&self.pool, data).await {
            tracing::warn!(user_id = %recipient.id, error = %e, "Failed to store notification");
        }

        if let Some(client) = &self.email {
            if let Err(e) = client.send(&recipient.email, template, merge_data).await {
                tracing::warn!(user_id = %recipient.id, template = %template, error = %e, "Failed to send email");
            }
        }
    }

    pub async fn ticket_published(&self, seller: &Profile, ticket: &Ticket) {
        self.deliver(
            seller,
            "ticket-published",
            CreateNotificationData {
                user_id: seller.id,
                kind: "ticket_published".to_string(),
                title: "Tu entrada fue publicada".to_string(),
                body: "Tu entrada ya está visible para los compradores.".to_string(),
                link: Some(format!("/tickets/{}", ticket.id)),
                metadata: Some(json!({ "ticket_id": ticket.id, "price": ticket.price })),
            },
        )
        .await;
    }

    pub async fn order_paid(&self, buyer: &Profile, seller: &Profile, order: &Order) {
        self.deliver(
            buyer,
            "order-paid-buyer",
            CreateNotificationData {
                user_id: buyer.id,
                kind: "order_paid".to_string(),
                title: "Pago confirmado".to_string(),
                body: "Tu compra fue confirmada. La entrada ya es tuya.".to_string(),
                link: Some(format!("/orders/{}", order.id)),
                metadata: Some(json!({ "order_id": order.id, "total_paid": order.total_paid })),
            },
        )
        .await;
        self.deliver(
            seller,
            "order-paid-seller",
            CreateNotificationData {
                user_id: seller.id,
                kind: "ticket_sold".to_string(),
                title: "¡Vendiste tu entrada!".to_string(),
                body: "El pago fue confirmado. El abono quedará disponible después del evento."
                    .to_string(),
                link: Some(format!("/orders/{}", order.id)),
                metadata: Some(json!({ "order_id": order.id, "amount": order.amount, "fee": order.fee })),
            },
        )
        .await;
    }

    pub async fn dispute_opened(&self, buyer: &Profile, seller: &Profile, order: &Order) {
        self.deliver(
            buyer,
            "dispute-opened-buyer",
            CreateNotificationData {
                user_id: buyer.id,
                kind: "dispute_opened".to_string(),
                title: "Reclamo recibido".to_string(),
                body: "Recibimos tu reclamo y el pago quedó retenido mientras lo revisamos."
                    .to_string(),
                link: Some(format!("/orders/{}", order.id)),
                metadata: Some(json!({ "order_id": order.id })),
            },
        )
        .await;
        self.deliver(
            seller,
            "dispute-opened-seller",
            CreateNotificationData {
                user_id: seller.id,
                kind: "dispute_opened".to_string(),
                title: "Tu venta tiene un reclamo".to_string(),
                body: "El comprador presentó un reclamo. El abono queda retenido hasta resolverlo."
                    .to_string(),
                link: Some(format!("/orders/{}", order.id)),
                metadata: Some(json!({ "order_id": order.id })),
            },
        )
        .await;
    }

    pub async fn dispute_resolved(
        &self,
        buyer: &Profile,
        seller: &Profile,
        order: &Order,
        refunded: bool,
    ) {
        let (buyer_title, buyer_body, seller_title, seller_body) = if refunded {
            (
                "Reclamo resuelto: reembolso",
                "Tu reclamo fue aceptado y el monto pagado será devuelto.",
                "Reclamo resuelto: venta anulada",
                "El reclamo fue aceptado y la venta quedó sin efecto.",
            )
        } else {
            (
                "Reclamo resuelto",
                "Revisamos tu reclamo y la venta fue confirmada como válida.",
                "Reclamo resuelto a tu favor",
                "El reclamo fue descartado. El abono volvió a la cola de pago.",
            )
        };
        self.deliver(
            buyer,
            "dispute-resolved-buyer",
            CreateNotificationData {
                user_id: buyer.id,
                kind: "dispute_resolved".to_string(),
                title: buyer_title.to_string(),
                body: buyer_body.to_string(),
                link: Some(format!("/orders/{}", order.id)),
                metadata: Some(json!({ "order_id": order.id, "refunded": refunded })),
            },
        )
        .await;
        self.deliver(
            seller,
            "dispute-resolved-seller",
            CreateNotificationData {
                user_id: seller.id,
                kind: "dispute_resolved".to_string(),
                title: seller_title.to_string(),
                body: seller_body.to_string(),
                link: Some(format!("/orders/{}", order.id)),
                metadata: Some(json!({ "order_id": order.id, "refunded": refunded })),
            },
        )
        .await;
    }

    pub async fn payout_released(&self, seller: &Profile, movement: &WalletMovement) {
        self.deliver(
            seller,
            "payout-released",
            CreateNotificationData {
                user_id: seller.id,
                kind: "payout_released".to_string(),
                title: "Abono liberado".to_string(),
                body: "El dinero de tu venta fue liberado y entra al próximo lote de pago."
                    .to_string(),
                link: Some(format!("/orders/{}", movement.order_id)),
                metadata: Some(json!({ "order_id": movement.order_id, "amount": movement.amount })),
            },
        )
        .await;
    }

    pub async fn tier_upgraded(&self, seller: &Profile, new_role: Role) {
        self.deliver(
            seller,
            "tier-upgraded",
            CreateNotificationData {
                user_id: seller.id,
                kind: "tier_upgraded".to_string(),
                title: "Subiste de categoría".to_string(),
                body: format!(
                    "Por tus ventas acumuladas ahora eres vendedor {} y pagas menos comisión.",
                    new_role
                ),
                link: Some("/profile".to_string()),
                metadata: Some(json!({ "role": new_role })),
            },
        )
        .await;
    }

    pub async fn renomination_uploaded(&self, buyer: &Profile, order: &Order) {
        self.deliver(
            buyer,
            "renomination-uploaded",
            CreateNotificationData {
                user_id: buyer.id,
                kind: "renomination_uploaded".to_string(),
                title: "Entrada renominada".to_string(),
                body: "El vendedor subió tu entrada renominada. Ya puedes descargarla.".to_string(),
                link: Some(format!("/orders/{}", order.id)),
                metadata: Some(json!({ "order_id": order.id })),
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> EmailClient {
        let base_url = Url::parse(&server.uri()).unwrap();
        EmailClient::new(base_url, Secret::new("test-key".to_string()))
    }

    #[tokio::test]
    async fn test_send_posts_template_recipient_and_merge_data() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(body_partial_json(json!({
                "to": "seller@example.cl",
                "template": "payout-released",
                "data": { "amount": "48500" },
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .send(
                "seller@example.cl",
                "payout-released",
                json!({ "amount": "48500" }),
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_surfaces_api_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .send("seller@example.cl", "payout-released", json!({}))
            .await;

        match result {
            Err(EmailError::ApiError(msg)) => assert!(msg.contains("500")),
            other => panic!("expected ApiError, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_probe_checks_the_health_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client_for(&server).probe().await.is_ok());
    }
}
