use rocket::Route;

mod ballots;
mod registration;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(registration::routes());
    routes.extend(ballots::routes());
    routes
}
