use crate::api::{PushRequest, PushResponse, ServiceDescription};
use actix_web::{App, HttpResponse, HttpServer, Responder, get, post, web};
use common::{PushResult, ServiceRegistry};
use log::*;
use ntfy::NtfyServiceFactory;

mod api;

const ADDR_ENV: &str = "MULTI_PUSH_ADDR";
const DEFAULT_ADDR: &str = "127.0.0.1:8888";

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

#[get("/services")]
async fn services(registry: web::Data<ServiceRegistry>) -> HttpResponse {
    let descriptions: Vec<ServiceDescription> = registry
        .list_services()
        .into_iter()
        .filter_map(|scheme| {
            let fields = registry.get_factory(&scheme)?.config_fields();
            Some(ServiceDescription { scheme, fields })
        })
        .collect();
    HttpResponse::Ok().json(descriptions)
}

#[post("/push")]
async fn push(req: web::Json<PushRequest>, registry: web::Data<ServiceRegistry>) -> HttpResponse {
    let service = match registry.create(&req.url) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to create service: {}", e);
            let err_resp = PushResponse {
                result: PushResult {
                    success: false,
                    response: Some(format!("Failed to create service: {}", e)),
                    ..Default::default()
                },
            };
            return HttpResponse::BadRequest().json(err_resp);
        }
    };
    info!("Received push request for service: {}", service.service_name());

    let result = service.send(&req.message, &req.params).await;

    let response = match result {
        Ok(push_result) => PushResponse {
            result: push_result,
        },
        Err(push_error) => {
            error!("Push via {} failed: {}", service.service_name(), push_error);
            PushResponse {
                result: PushResult {
                    success: false,
                    response: Some(push_error.to_string()),
                    ..Default::default()
                },
            }
        }
    };

    HttpResponse::Ok().json(response)
}

fn build_registry() -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    registry.register(Box::new(NtfyServiceFactory));
    registry
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let registry = build_registry();
    info!("Registered services: {:?}", registry.list_services());

    let registry_data = web::Data::new(registry);
    let addr = std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    info!("Listening on {}", addr);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(registry_data.clone())
            .service(health)
            .service(services)
            .service(push)
    })
    .bind(&addr)?
    .run()
    .await?;

    Ok(())
}
