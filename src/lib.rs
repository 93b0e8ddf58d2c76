#[macro_use]
extern crate rocket;

pub mod blast;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod request_logger;
pub mod routes;

use crate::db::{CrmDb, MIGRATOR};
use crate::mail::{MailConfig, Mailer, SmtpMailer};
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    // The store is a single SQLite file, created at startup if absent.
    let figment =
        rocket::Config::figment().join(("databases.crm_db.url", "sqlite://crm.db?mode=rwc"));

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::custom(figment)
        .attach(RequestLogger)
        .attach(CrmDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match CrmDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        match MIGRATOR.run(&pool).await {
                            Ok(_) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        // Clone and manage the pool for handlers that run their own
        // transactions (lead conversion, campaign blasts)
        .attach(AdHoc::try_on_ignite("Manage DB Pool", |rocket| async move {
            match CrmDb::fetch(&rocket) {
                Some(db) => {
                    let pool = (**db).clone();
                    Ok(rocket.manage(pool))
                }
                None => Err(rocket),
            }
        }))
        // Static SMTP relay configuration, read once at startup
        .attach(AdHoc::try_on_ignite("Mail Relay", |rocket| async move {
            let config = MailConfig::from_env();
            match SmtpMailer::from_config(&config) {
                Ok(mailer) => {
                    log::info!("mail relay configured for {}:{}", config.host, config.port);
                    Ok(rocket.manage(Arc::new(mailer) as Arc<dyn Mailer>))
                }
                Err(e) => {
                    log::error!("invalid mail relay configuration: {}", e);
                    Err(rocket)
                }
            }
        }))
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Health routes
                routes::health::health_check,
                // Customer routes
                routes::customers::list_customers,
                routes::customers::get_customer,
                routes::customers::create_customer,
                routes::customers::update_customer,
                routes::customers::delete_customer,
                // Contact routes
                routes::contacts::list_contacts,
                routes::contacts::get_contact,
                routes::contacts::create_contact,
                routes::contacts::update_contact,
                routes::contacts::delete_contact,
                // Task routes
                routes::tasks::list_tasks,
                routes::tasks::get_task,
                routes::tasks::create_task,
                routes::tasks::update_task,
                routes::tasks::delete_task,
                // Deal routes
                routes::deals::list_deals,
                routes::deals::deal_pipeline,
                routes::deals::get_deal,
                routes::deals::create_deal,
                routes::deals::update_deal,
                routes::deals::delete_deal,
                // Reminder routes
                routes::reminders::list_reminders,
                routes::reminders::get_reminder,
                routes::reminders::create_reminder,
                routes::reminders::update_reminder,
                routes::reminders::delete_reminder,
                // Activity routes
                routes::activities::list_activities,
                routes::activities::activity_timeline,
                routes::activities::get_activity,
                routes::activities::create_activity,
                routes::activities::update_activity,
                routes::activities::delete_activity,
                // Lead routes
                routes::leads::list_leads,
                routes::leads::get_lead,
                routes::leads::create_lead,
                routes::leads::update_lead,
                routes::leads::delete_lead,
                routes::leads::convert_lead,
                // Campaign routes
                routes::campaigns::list_campaigns,
                routes::campaigns::get_campaign,
                routes::campaigns::create_campaign,
                routes::campaigns::update_campaign,
                routes::campaigns::delete_campaign,
                routes::campaigns::list_campaign_steps,
                routes::campaigns::add_campaign_step,
                routes::campaigns::get_campaign_step,
                routes::campaigns::update_campaign_step,
                routes::campaigns::delete_campaign_step,
                routes::campaigns::list_campaign_logs,
                routes::campaigns::run_campaign,
                // Segment routes
                routes::segments::list_segments,
                routes::segments::get_segment,
                routes::segments::create_segment,
                routes::segments::update_segment,
                routes::segments::delete_segment,
                routes::segments::segment_recipients,
                // Email routes
                routes::emails::send_email,
                // Stats routes
                routes::stats::get_stats,
            ],
        )
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("CRM API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::db::{CrmDb, MIGRATOR};
    use crate::mail::{Mailer, MemoryMailer};
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::Database;
    use rocket_db_pools::sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use rocket_db_pools::sqlx::{self, SqlitePool};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum TestDatabaseError {
        #[error("io error: {0}")]
        Io(#[from] std::io::Error),
        #[error("database error: {0}")]
        Sqlx(#[from] sqlx::Error),
        #[error("migration error: {0}")]
        Migration(#[from] sqlx::migrate::MigrateError),
    }

    /// Ephemeral file-backed SQLite database for integration tests.
    ///
    /// The file lives in a temporary directory removed on drop; the schema is
    /// applied by the same migrator the server runs at startup.
    pub struct TestDatabase {
        dir: TempDir,
        pool: SqlitePool,
    }

    impl TestDatabase {
        /// Provision a fresh migrated database under a temporary directory.
        pub async fn new() -> Result<Self, TestDatabaseError> {
            let dir = TempDir::new()?;
            let options = SqliteConnectOptions::new()
                .filename(dir.path().join("crm.db"))
                .create_if_missing(true);

            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?;

            MIGRATOR.run(&pool).await?;

            Ok(Self { dir, pool })
        }

        fn db_path(&self) -> PathBuf {
            self.dir.path().join("crm.db")
        }

        /// Connection URL for pointing a Rocket instance at this database.
        pub fn url(&self) -> String {
            format!("sqlite://{}?mode=rwc", self.db_path().display())
        }

        /// Pool for seeding rows and asserting on state directly.
        pub fn pool(&self) -> &SqlitePool {
            &self.pool
        }

        /// Clone of the pooled connection handle.
        pub fn pool_clone(&self) -> SqlitePool {
            self.pool.clone()
        }

        /// Close pool connections; the backing directory is removed on drop.
        pub async fn close(self) {
            self.pool.close().await;
        }
    }

    /// Builder for constructing Rocket instances tailored for integration
    /// tests.
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pool: Option<SqlitePool>,
        attach_db: bool,
        mailer: Option<Arc<MemoryMailer>>,
    }

    impl Default for TestRocketBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging
        /// disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pool: None,
                attach_db: false,
                mailer: None,
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Point the instance at a [`TestDatabase`]: the `CrmDb` pool reads
        /// its URL from the figment, and the raw pool is managed for handlers
        /// that run their own transactions.
        pub fn with_database(mut self, db: &TestDatabase) -> Self {
            self.figment = self.figment.merge(("databases.crm_db.url", db.url()));
            self.pool = Some(db.pool_clone());
            self.attach_db = true;
            self
        }

        /// Use a shared [`MemoryMailer`] so the test can inspect deliveries
        /// or make specific recipients fail.
        pub fn with_mailer(mut self, mailer: Arc<MemoryMailer>) -> Self {
            self.mailer = Some(mailer);
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            if self.attach_db {
                rocket = rocket.attach(CrmDb::init());
            }

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pool {
                rocket = rocket.manage(pool);
            }

            let mailer = self
                .mailer
                .unwrap_or_else(|| Arc::new(MemoryMailer::new()));
            rocket.manage(Arc::clone(&mailer) as Arc<dyn Mailer>)
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
