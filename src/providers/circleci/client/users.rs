use super::core::CircleCiClient;
use crate::error::Result;
use crate::providers::circleci::types::{Collaboration, User};

impl CircleCiClient {
    /// `GET /me/collaborations`: the organizations the token's user belongs to.
    pub async fn fetch_collaborations(&self) -> Result<Vec<Collaboration>> {
        self.get_json("me/collaborations", &[]).await
    }

    /// `GET /me`, used as a connectivity and credential probe.
    pub async fn fetch_me(&self) -> Result<User> {
        self.get_json("me", &[]).await
    }
}
