//! integron_finder - Integron detection from search tool hit tables
//!
//! Assembles attC sites, integrases and cassette proteins found on a replicon
//! into typed integrons (complete, CALIN, In0), annotates their proteins and
//! projects them as GenBank features.
//!
//! # Modules
//! - `hits`: Feature rows shared by all stages, evalue deduplication
//! - `infernal`: `cmsearch` tblout reading (attC sites)
//! - `hmm`: `hmmsearch` domtblout reading and invocation, integrase merge
//! - `seqio`: FASTA I/O with gzip support, protein bank
//! - `cluster`: Proximity grouping, circular replicons included
//! - `integron`: The integron entity and its element tables
//! - `motif`: attI site and promoter search around integrases
//! - `classifier`: Integron classification and per-replicon summary
//! - `func_annot`: Functional annotation of cassette proteins
//! - `replicon`: Replicon sequence and feature list
//! - `annotation`: Projection of integrons onto the replicon features
//! - `output`: `.integrons`, `.summary` and GenBank writers
//! - `config`: Run configuration and topology file
//! - `error`: Error types

pub mod error;
pub mod hits;
pub mod infernal;
pub mod hmm;
pub mod seqio;
pub mod cluster;
pub mod integron;
pub mod motif;
pub mod classifier;
pub mod func_annot;
pub mod replicon;
pub mod annotation;
pub mod output;
pub mod config;
