use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::key::{StatusResponse, VoterKey},
        store::Stores,
        voter::VoterId,
    },
};

pub fn routes() -> Vec<Route> {
    routes![register_key, voter_key]
}

#[post("/register-ssi", data = "<request>", format = "json")]
async fn register_key(request: Json<VoterKey>, stores: &State<Stores>) -> Result<Json<StatusResponse>> {
    let VoterKey {
        voter_id,
        ssi_public_jwk,
    } = request.into_inner();

    // Refuse keys that could never verify a signature.
    ssi_public_jwk.import()?;

    stores.registry.register(&voter_id, &ssi_public_jwk).await?;
    info!("Registered SSI key for voter {voter_id}");
    Ok(Json(StatusResponse::ok()))
}

#[get("/voters/<voter_id>/key")]
async fn voter_key(voter_id: VoterId, stores: &State<Stores>) -> Result<Json<VoterKey>> {
    let key = stores
        .registry
        .lookup(&voter_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("SSI key for voter {voter_id}")))?;
    Ok(Json(VoterKey::new(voter_id, key)))
}
