//! # Metaweave
//!
//! A template-driven engine for merging rich user content and structured
//! metadata into canonical records.
//!
//! Metaweave takes two heterogeneous JSON sources — free-form "rich user
//! content" (RUC) records and structured metadata reachable through an
//! XQuery-over-HTTP service — and merges them into one output record per
//! identifier, driven entirely by a declarative JSON template. Each
//! template leaf beginning with `<` is an instruction: an ordered list of
//! fallback directives saying where to pull the field from, how to
//! transform it, and what to do when nothing is found.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌───────────┐
//! │ Template  │──▶│ Traverser  │──▶│ Evaluator  │──▶ Path Resolver (RUC)
//! │  (JSON)   │   │ (mirrors   │   │ (ordered   │──▶ Query Service (MD)
//! └──────────┘    │  topology) │   │  fallback) │──▶ Vocabulary Cache
//!                 └───────────┘    └───────────┘
//! ```
//!
//! ## Instruction language
//!
//! ```text
//! <ruc:overview:^.*(### Data.*)$        regex capture from rich content
//! <ruc:tags[]::Category: $1             sequence substitution, URIs pass through
//! <md:@queries/domains.rq:researchDomains   file query + vocabulary filter
//! <ruc:title,md:name,default:Untitled   ordered fallback, first hit wins
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Engine error taxonomy |
//! | [`model`] | Record kinds, resolved values, record context |
//! | [`path`] | Case-insensitive path resolution with indirection |
//! | [`vocab`] | Controlled-vocabulary normalization and cache |
//! | [`directive`] | Instruction grammar |
//! | [`eval`] | Directive evaluation with ordered fallback |
//! | [`traverse`] | Recursive template traversal |
//! | [`query`] | Structured-query service client |
//! | [`content`] | Rich-user-content loading and record discovery |
//! | [`assemble`] | Per-record orchestration and persistence |

pub mod assemble;
pub mod config;
pub mod content;
pub mod directive;
pub mod error;
pub mod eval;
pub mod model;
pub mod path;
pub mod query;
pub mod traverse;
pub mod vocab;
