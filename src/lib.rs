//! # Info Harvest
//!
//! An incremental scraper for a university information portal.
//!
//! The portal publishes notices through one paginated JSON listing API;
//! each notice links to a detail page that is either served by the portal
//! itself (behind a CSRF-gated JSON endpoint) or redirected to one of many
//! legacy departmental sites with their own layouts and charsets. Info
//! Harvest walks the listing down to a cutoff time, extracts every detail
//! page with a site-specific extractor, and upserts the result into SQLite
//! keyed by the portal's article id.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │  Session  │──▶│  Listing  │──▶│   Detail   │──▶│  Ingest  │
//! │ rate+CSRF │   │  cutoff   │   │ extractors │   │  digest  │
//! └───────────┘   └───────────┘   └────────────┘   └────┬─────┘
//!                                                       │
//!                         ┌─────────────────────────────┤
//!                         ▼                             ▼
//!                   ┌──────────┐                  ┌──────────┐
//!                   │  scrape  │                  │ get/list │
//!                   │  watch   │                  │  stats   │
//!                   └──────────┘                  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harvest init                  # create database
//! harvest scrape                # one incremental run
//! harvest scrape --listing-only # metadata only, no detail pages
//! harvest watch                 # run every scrape.interval_secs
//! harvest list --limit 20
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`session`] | Rate-limited HTTP session and CSRF capture |
//! | [`fetch`] | Encoding-aware fetching |
//! | [`traits`] | `Extractor`, `ArticleSource` and the extractor registry |
//! | [`extract`] | HTML helpers shared by the site extractors |
//! | `extractor_*` | One module per departmental site layout, plus the fallback |
//! | [`listing`] | Listing API and cutoff scanner |
//! | [`detail`] | Detail page resolution |
//! | [`portal`] | Live portal client |
//! | [`ingest`] | Digest, validation, upsert, cursor |
//! | [`scrape`] | Run orchestration |
//! | [`progress`] | Stderr progress reporting |
//! | [`get`] | Store queries, `get` and `list` commands |
//! | [`stats`] | Store statistics |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod detail;
pub mod error;
pub mod extract;
pub mod extractor_career;
pub mod extractor_fallback;
pub mod extractor_internal;
pub mod extractor_kybg;
pub mod extractor_library;
pub mod extractor_myhome;
pub mod extractor_table;
pub mod fetch;
pub mod get;
pub mod ingest;
pub mod listing;
pub mod migrate;
pub mod models;
pub mod portal;
pub mod progress;
pub mod scrape;
pub mod session;
pub mod stats;
pub mod traits;

#[cfg(test)]
mod test_logs;
