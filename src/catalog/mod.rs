//! PokeAPI catalog client: paginated list retrieval plus per-Pokemon
//! details, normalized to the shape the UI renders.

pub mod commands;

use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

const POKEAPI_BASE_URL: &str = "https://pokeapi.co/api/v2";
const POKEMON_PER_PAGE: u32 = 20;
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pokemon {
    pub id: u32,
    pub name: String,
    pub image: String,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonPage {
    pub pokemons: Vec<Pokemon>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    next: Option<String>,
    results: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    id: u32,
    name: String,
    sprites: Sprites,
    types: Vec<TypeSlot>,
}

#[derive(Debug, Deserialize)]
struct Sprites {
    front_default: Option<String>,
    other: Option<OtherSprites>,
}

#[derive(Debug, Deserialize)]
struct OtherSprites {
    #[serde(rename = "official-artwork")]
    official_artwork: Option<Artwork>,
}

#[derive(Debug, Deserialize)]
struct Artwork {
    front_default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TypeSlot {
    #[serde(rename = "type")]
    kind: NamedResource,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
}

impl From<DetailResponse> for Pokemon {
    fn from(detail: DetailResponse) -> Self {
        // Prefer the official artwork, fall back to the default sprite.
        let image = detail
            .sprites
            .other
            .and_then(|other| other.official_artwork)
            .and_then(|artwork| artwork.front_default)
            .or(detail.sprites.front_default)
            .unwrap_or_default();

        Self {
            id: detail.id,
            name: detail.name,
            image,
            types: detail.types.into_iter().map(|slot| slot.kind.name).collect(),
        }
    }
}

#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: POKEAPI_BASE_URL.to_string(),
        })
    }

    /// Fetches one page of the catalog. `page_url` continues from a prior
    /// page's `next` cursor; `None` starts from the beginning.
    pub async fn fetch_page(&self, page_url: Option<String>) -> Result<PokemonPage> {
        let url = page_url.unwrap_or_else(|| {
            format!("{}/pokemon?limit={}", self.base_url, POKEMON_PER_PAGE)
        });
        let list: ListResponse = self.get_json(&url).await?;

        let mut detail_fetches = JoinSet::new();
        for entry in list.results {
            let client = self.clone();
            detail_fetches.spawn(async move { client.fetch_by_url(&entry.url).await });
        }

        let mut pokemons = Vec::new();
        while let Some(joined) = detail_fetches.join_next().await {
            match joined.context("detail fetch task failed to join")? {
                Ok(pokemon) => pokemons.push(pokemon),
                Err(err) => warn!("Skipping Pokemon detail that failed to load: {err}"),
            }
        }
        // The list endpoint pages in id order; restore it after the fan-out.
        pokemons.sort_by_key(|pokemon| pokemon.id);

        Ok(PokemonPage {
            pokemons,
            next: list.next,
        })
    }

    pub async fn fetch_details(&self, name_or_id: &str) -> Result<Pokemon> {
        let url = format!("{}/pokemon/{}", self.base_url, name_or_id);
        self.fetch_by_url(&url).await
    }

    async fn fetch_by_url(&self, url: &str) -> Result<Pokemon> {
        let detail: DetailResponse = self.get_json(url).await?;
        Ok(Pokemon::from(detail))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.http
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} returned an error status"))?
            .json()
            .await
            .with_context(|| format!("failed to decode response from {url}"))
    }
}
