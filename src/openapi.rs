use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document for the checkout and order surface.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::orders::get_checkout_data,
        crate::handlers::orders::create_order,
        crate::handlers::orders::verify_payment,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::deliver_order,
    ),
    components(schemas(
        crate::handlers::orders::OrderItemInput,
        crate::handlers::orders::CreateOrderRequest,
        crate::handlers::orders::UpdateStatusRequest,
        crate::handlers::orders::CheckoutData,
        crate::services::orders::AddressInput,
        crate::services::orders::VerifyPaymentInput,
        crate::services::pricing::QuoteItem,
        crate::services::pricing::QuotedLine,
        crate::entities::order::OrderStatus,
        crate::entities::order::ShippingAddress,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Orders", description = "Checkout quotes, order creation, payment capture and fulfillment")
    ),
    info(
        title = "Storefront API",
        description = "REST backend for the storefront: catalog, carts, checkout and orders"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Swagger UI mounted at /docs, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
