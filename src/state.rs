use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub s3_client: Option<aws_sdk_s3::Client>,
}

impl AppState {
    pub async fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = db::build_pool(&config)?;

        let s3_client = if config.documents_bucket.is_some() {
            let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            Some(aws_sdk_s3::Client::new(&aws_config))
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            s3_client,
        })
    }
}
