use rocket::{Build, Rocket};

#[rocket::launch]
fn rocket() -> Rocket<Build> {
    let server = crm_server::rocket();
    log::info!("Starting CRM API Server");
    server
}
