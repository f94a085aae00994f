//! # gh-profiler
//!
//! Samples a GitHub user's public repositories and renders an LLM-assisted
//! code quality report as a static HTML page.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Discovery   │──▶│  Selection   │──▶│  Evaluation  │──▶│  Report  │
//! │ GitHub+cache │   │ score paths  │   │ LLM fan-out  │   │   HTML   │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ghp repos --user octocat             # what would be analyzed
//! ghp report --user octocat            # full run, writes out/profile-octocat.html
//! git ls-files | ghp select --chunks 6 # offline file ranking
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`cache`] | TTL disk cache |
//! | [`host`] | Code host abstraction and its caching front |
//! | [`github`] | GitHub GraphQL/REST client |
//! | [`discover`] | Repository merge and ranking |
//! | [`select`] | Path scoring and repository kind detection |
//! | [`sampler`] | File sampling into chunks |
//! | [`llm`] | LLM provider abstraction |
//! | [`decode`] | JSON extraction from completions |
//! | [`fanout`] | Bounded, throttled task fan-out |
//! | [`evaluate`] | Retrying, decoding LLM evaluation |
//! | [`aggregate`] | Repository score and highlights |
//! | [`prompts`] | Prompt templates |
//! | [`report`] | HTML rendering |
//! | [`profile`] | End-to-end profiling service |
//! | [`progress`] | Progress reporting on stderr |

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod decode;
pub mod discover;
pub mod evaluate;
pub mod fanout;
pub mod github;
pub mod host;
pub mod llm;
pub mod models;
pub mod profile;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod sampler;
pub mod select;
