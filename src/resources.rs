//! Typed endpoints of the Castify admin API.
//!
//! Request and response bodies are explicit serde records checked at the boundary;
//! every call goes through `ApiClient` so the bearer/401 contract applies uniformly.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::error::ApiResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub role: String,
}

impl AdminProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub party: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub recent_election: String,
}

/// Body for creating or updating a candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInput {
    pub name: String,
    pub party: String,
    pub image: String,
    pub status: String,
    pub recent_election: String,
}

impl From<&Candidate> for CandidateInput {
    fn from(c: &Candidate) -> Self {
        Self {
            name: c.name.clone(),
            party: c.party.clone(),
            image: c.image.clone(),
            status: c.status.clone(),
            recent_election: c.recent_election.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    pub id: String,
    #[serde(default)]
    pub serial_no: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub cnic: String,
    #[serde(default)]
    pub election_id: String,
    #[serde(default)]
    pub election_name: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewVoter {
    pub name: String,
    pub email: String,
    pub cnic: String,
    pub election_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub party: String,
    #[serde(default)]
    pub symbol: String,
    pub votes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total_votes: u64,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub candidates: Vec<CandidateResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub candidate_id: String,
    pub name: String,
    pub party: String,
    pub votes: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Winner { winner: Standing, runner_up: Option<Standing> },
    /// Two or more candidates share the top vote count.
    Tie { leaders: Vec<Standing> },
    NoVotes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsSummary {
    pub total_votes: u64,
    /// Highest vote count first; equal counts ordered by name.
    pub standings: Vec<Standing>,
    pub outcome: Outcome,
}

impl ElectionResults {
    /// Shares are computed from the candidates' own counts; the reported
    /// `totalVotes` is informational only.
    pub fn summarize(&self) -> ResultsSummary {
        let total = self.candidates.iter().fold(0u64, |acc, c| acc.saturating_add(c.votes));
        let mut standings: Vec<Standing> = self
            .candidates
            .iter()
            .map(|c| Standing {
                candidate_id: c.id.clone(),
                name: c.name.clone(),
                party: c.party.clone(),
                votes: c.votes,
                percentage: if total == 0 { 0.0 } else { c.votes as f64 * 100.0 / total as f64 },
            })
            .collect();
        standings.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.name.cmp(&b.name)));

        let outcome = match standings.first() {
            None => Outcome::NoVotes,
            Some(top) if top.votes == 0 => Outcome::NoVotes,
            Some(top) => {
                let leaders: Vec<Standing> = standings.iter().take_while(|s| s.votes == top.votes).cloned().collect();
                if leaders.len() > 1 {
                    Outcome::Tie { leaders }
                } else {
                    Outcome::Winner { winner: top.clone(), runner_up: standings.get(1).cloned() }
                }
            }
        };
        ResultsSummary { total_votes: total, standings, outcome }
    }
}

/// List endpoints answer either a bare array or `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Bare(v) | ListBody::Wrapped { data: v } => v,
        }
    }
}

fn item_path(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, urlencoding::encode(id))
}

impl ApiClient {
    async fn list<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Vec<T>> {
        Ok(self.get_json::<ListBody<T>>(path).await?.into_vec())
    }

    pub async fn me(&self) -> ApiResult<AdminProfile> {
        self.get_json("me/").await
    }

    /// Returns the server's confirmation message, if any.
    pub async fn change_password(&self, req: &ChangePasswordRequest) -> ApiResult<Option<String>> {
        let v: serde_json::Value = self.patch_json("me/change-password", req).await?;
        Ok(v.get("message").and_then(|m| m.as_str()).map(str::to_string))
    }

    pub async fn list_candidates(&self) -> ApiResult<Vec<Candidate>> {
        self.list("candidate").await
    }

    pub async fn create_candidate(&self, input: &CandidateInput) -> ApiResult<Candidate> {
        self.post_json("candidate", input).await
    }

    pub async fn update_candidate(&self, id: &str, input: &CandidateInput) -> ApiResult<Candidate> {
        self.put_json(&item_path("candidate", id), input).await
    }

    pub async fn delete_candidate(&self, id: &str) -> ApiResult<()> {
        self.delete(&item_path("candidate", id)).await
    }

    pub async fn list_elections(&self) -> ApiResult<Vec<Election>> {
        self.list("election").await
    }

    pub async fn election_results(&self, id: &str) -> ApiResult<ElectionResults> {
        self.get_json(&format!("{}/results", item_path("election", id))).await
    }

    pub async fn list_voters(&self) -> ApiResult<Vec<Voter>> {
        self.list("voter").await
    }

    pub async fn add_voter(&self, voter: &NewVoter) -> ApiResult<Voter> {
        self.post_json("voter", voter).await
    }

    pub async fn delete_voter(&self, id: &str) -> ApiResult<()> {
        self.delete(&item_path("voter", id)).await
    }
}
