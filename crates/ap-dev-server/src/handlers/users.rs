// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Stand-in user lookup; there is no identity service locally

use ap_api_contract::{GetUserResponse, User, UserIdQuery};
use axum::{Json, extract::Query};

const LOCAL_EMAIL: &str = "editor@localhost";
const LOCAL_NAME: &str = "Local editor";
const LOCAL_AVATAR_URL: &str = "https://www.gravatar.com/avatar?d=mp";

pub async fn get_user(Query(query): Query<UserIdQuery>) -> Json<GetUserResponse> {
    Json(GetUserResponse {
        user: User {
            user_id: query.user_id,
            email: LOCAL_EMAIL.to_string(),
            name: LOCAL_NAME.to_string(),
            avatar_url: LOCAL_AVATAR_URL.to_string(),
        },
    })
}
