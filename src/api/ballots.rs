use rocket::{serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::Result,
    model::{
        admission::{AdmissionController, AdmissionResult, Submission},
        api::{
            ballot::AdmittedBallot,
            pagination::{Paginated, PaginationRequest},
        },
        store::Stores,
        voter::VoterId,
    },
};

pub fn routes() -> Vec<Route> {
    routes![submit_signed_ballots, voter_ballots]
}

#[post("/submit-signed-ballots", data = "<submission>", format = "json")]
async fn submit_signed_ballots(
    submission: Json<Submission>,
    config: &State<Config>,
    stores: &State<Stores>,
) -> Result<Json<AdmissionResult>> {
    let controller =
        AdmissionController::new(config, stores.registry.as_ref(), stores.log.as_ref());
    let result = controller.submit(submission.into_inner()).await?;
    Ok(Json(result))
}

#[get("/voters/<voter_id>/ballots?<pagination..>")]
async fn voter_ballots(
    voter_id: VoterId,
    pagination: PaginationRequest,
    stores: &State<Stores>,
) -> Result<Json<Paginated<AdmittedBallot>>> {
    let entries = stores
        .log
        .entries_for(&voter_id, pagination.skip(), pagination.limit())
        .await?;
    let total = stores.log.count_for(&voter_id).await?;

    let items = entries.into_iter().map(AdmittedBallot::from).collect();
    Ok(Json(pagination.to_paginated(total, items)))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rocket::{
        futures::future::join,
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{json, serde_json},
    };

    use crate::model::{
        admission::SignedBallot,
        api::error::ErrorBody,
        ballot::Ballot,
        db::ballot_log::BallotLogEntry,
        key::{
            examples::{other_signing_key, signing_key},
            PublicKeyDescriptor,
        },
        mongodb::Coll,
        signature::examples::{sign, sign_fixed},
        store::MemoryStore,
    };

    use super::*;

    async fn submit<'c>(client: &'c Client, submission: &Submission) -> LocalResponse<'c> {
        client
            .post(uri!(submit_signed_ballots))
            .header(ContentType::JSON)
            .body(json!(submission).to_string())
            .dispatch()
            .await
    }

    async fn expect_error(response: LocalResponse<'_>, status: Status, kind: &str) -> ErrorBody {
        assert_eq!(response.status(), status);
        let body: ErrorBody = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body.error, kind);
        body
    }

    fn signed(choices: &[&str]) -> Submission {
        Submission::example(
            VoterId::example(),
            choices
                .iter()
                .map(|choice| SignedBallot::example(&signing_key(), choice))
                .collect(),
        )
    }

    #[backend_test(registered)]
    async fn submit_admits_batch(client: Client, store: MemoryStore) {
        let response = submit(&client, &signed(&["A"])).await;
        assert_eq!(response.status(), Status::Ok);
        let result: AdmissionResult =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(result.admitted_count, 1);

        let entries = store.all_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ballot, r#"{"choice":"A"}"#);

        // A signature over `{"choice":"B"}` presented for `{"choice":"A"}`.
        let forged = Submission::example(
            VoterId::example(),
            vec![SignedBallot {
                ballot: Ballot::example("A"),
                signature: sign(&signing_key(), &Ballot::example("B")),
            }],
        );
        let body = expect_error(
            submit(&client, &forged).await,
            Status::BadRequest,
            "signature_rejected",
        )
        .await;
        assert_eq!(body.position, Some(1));
        assert_eq!(store.all_entries().await.len(), 1);
    }

    #[backend_test(registered)]
    async fn bad_signature_rejects_batch(client: Client, store: MemoryStore) {
        let mut submission = signed(&["A", "B", "C"]);
        submission.ballots[1].signature = sign(&other_signing_key(), &Ballot::example("B"));

        let body = expect_error(
            submit(&client, &submission).await,
            Status::BadRequest,
            "signature_rejected",
        )
        .await;
        assert_eq!(body.position, Some(2));
        assert!(store.all_entries().await.is_empty());
    }

    #[backend_test]
    async fn unregistered_voter_needs_inline_key(client: Client, store: MemoryStore) {
        expect_error(
            submit(&client, &signed(&["A"])).await,
            Status::BadRequest,
            "no_registered_key",
        )
        .await;
        assert!(store.all_entries().await.is_empty());

        let mut submission = signed(&["A"]);
        submission.inline_key = Some(PublicKeyDescriptor::example());
        let response = submit(&client, &submission).await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(store.all_entries().await.len(), 1);
    }

    #[backend_test]
    async fn inline_key_must_be_p256(client: Client) {
        let mut submission = signed(&["A"]);
        let mut key = PublicKeyDescriptor::example();
        key.crv = "P-384".to_string();
        submission.inline_key = Some(key);

        expect_error(
            submit(&client, &submission).await,
            Status::BadRequest,
            "invalid_key",
        )
        .await;
    }

    #[backend_test(registered)]
    async fn empty_batch_is_rejected(client: Client) {
        expect_error(
            submit(&client, &signed(&[])).await,
            Status::BadRequest,
            "empty_batch",
        )
        .await;
    }

    #[backend_test(registered)]
    async fn imprecise_number_is_unprocessable(client: Client, store: MemoryStore) {
        let body = json!({
            "voter_id": VoterId::example(),
            "ballots": [{
                "ballot": json!({ "choice": "A" }),
                "signature": sign(&signing_key(), &Ballot::example("A")),
            }],
        })
        .to_string()
        .replace(r#"{"choice":"A"}"#, r#"{"choice":"A","n":18446744073709551617}"#);

        let response = client
            .post(uri!(submit_signed_ballots))
            .header(ContentType::JSON)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        assert!(store.all_entries().await.is_empty());
    }

    #[backend_test(registered)]
    async fn both_signature_forms_are_accepted(client: Client, store: MemoryStore) {
        let ballot = Ballot::example("A");
        let submission = Submission::example(
            VoterId::example(),
            vec![
                SignedBallot {
                    signature: sign(&signing_key(), &ballot),
                    ballot: ballot.clone(),
                },
                SignedBallot {
                    signature: sign_fixed(&signing_key(), &ballot),
                    ballot,
                },
            ],
        );
        let response = submit(&client, &submission).await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(store.all_entries().await.len(), 2);
    }

    #[backend_test]
    async fn browser_signed_ballot_is_admitted(client: Client, store: MemoryStore) {
        // Signed in a browser over `JSON.stringify` of the canonical form.
        let key: PublicKeyDescriptor =
            serde_json::from_str(&fs::read_to_string("example_ballots/voter.jwk").unwrap())
                .unwrap();
        let ballot: Ballot =
            serde_json::from_str(&fs::read_to_string("example_ballots/ballot.json").unwrap())
                .unwrap();
        let signature = fs::read_to_string("example_ballots/ballot.sig.webcrypto").unwrap();
        let canonical = fs::read_to_string("example_ballots/ballot.canonical").unwrap();

        let submission = Submission {
            voter_id: VoterId::example(),
            inline_key: Some(key),
            ballots: vec![SignedBallot { ballot, signature }],
        };
        let response = submit(&client, &submission).await;
        assert_eq!(response.status(), Status::Ok);

        let entries = store.all_entries().await;
        assert_eq!(entries[0].ballot, canonical);
    }

    #[backend_test(registered)]
    async fn concurrent_batches_are_both_kept(client: Client, store: MemoryStore) {
        let first = signed(&["A", "B"]);
        let second = signed(&["C", "D", "E"]);

        let (r1, r2) = join(submit(&client, &first), submit(&client, &second)).await;
        assert_eq!(r1.status(), Status::Ok);
        assert_eq!(r2.status(), Status::Ok);

        let entries = store.all_entries().await;
        assert_eq!(entries.len(), 5);
        let sequences = entries.iter().map(|e| e.sequence).collect::<Vec<_>>();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    }

    #[backend_test(registered)]
    async fn list_voter_ballots(client: Client) {
        submit(&client, &signed(&["A", "B", "C"])).await;

        let pagination = PaginationRequest {
            page_num: 1,
            page_size: 2,
        };
        let response = client
            .get(uri!(voter_ballots(VoterId::example(), pagination)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let page: Paginated<AdmittedBallot> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].sequence, 1);
        assert_eq!(page.items[0].ballot, r#"{"choice":"A"}"#);

        let pagination = PaginationRequest {
            page_num: 2,
            page_size: 2,
        };
        let response = client
            .get(uri!(voter_ballots(VoterId::example(), pagination)))
            .dispatch()
            .await;
        let page: Paginated<AdmittedBallot> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].ballot, r#"{"choice":"C"}"#);

        // Defaults apply without a query string; other voters see nothing.
        let response = client.get("/voters/V2/ballots").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let page: Paginated<AdmittedBallot> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.pagination.page_num, 1);
        assert_eq!(page.pagination.page_size, 50);
        assert_eq!(page.pagination.total, 0);

        let response = client.get("/voters/V1/ballots?page_num=0").dispatch().await;
        assert_ne!(response.status(), Status::Ok);
    }

    #[backend_test(registered)]
    async fn admitted_batch_persists_in_mongodb(client: Client, ballots: Coll<BallotLogEntry>) {
        let response = submit(&client, &signed(&["A", "B"])).await;
        assert_eq!(response.status(), Status::Ok);

        let mut submission = signed(&["C", "D"]);
        submission.ballots[1].signature = sign(&other_signing_key(), &Ballot::example("D"));
        expect_error(
            submit(&client, &submission).await,
            Status::BadRequest,
            "signature_rejected",
        )
        .await;

        assert_eq!(ballots.count_documents(None, None).await.unwrap(), 2);
        let first = ballots.find_one(None, None).await.unwrap().unwrap();
        assert_eq!(first.voter_id, VoterId::example());
    }
}
