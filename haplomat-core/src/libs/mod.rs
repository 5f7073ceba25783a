// Hapl-o-Mat front-end - run orchestration for haplotype frequency estimation
// Copyright (C) 2024  Osma S. Rautila
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! Hapl-o-Mat front-end
//!
//! This library configures, launches and monitors the external Hapl-o-Mat haplotype
//! frequency estimator and ingests its output files. It does not estimate anything itself.
//!
//! * Read and write Hapl-o-Mat parameter files
//! * Detect the input dialect (MAC or GLSC) and the loci of a genotype file
//! * Refresh the IPD-IMGT/HLA reference data through the `BuildData` tool
//! * Run `haplomat`, stream its output and poll the epsilon trace
//! * Summarize haplotype frequencies, genotype counts and the convergence trace
//!
//! # Getting started
//!
//! The desktop application lives in the `haplomat-gui` crate. The same workflow is
//! available headless:
//!
//! ```bash
//! haplomat-cli inspect-input genotypes.txt --installation ~/haplomat
//!
//! haplomat-cli run --installation ~/haplomat --parameters results/Run1_parametersMAC
//!
//! haplomat-cli results --parameters results/Run1_parametersMAC --cumulative 0.995 --plot results
//! ```
//!
//! Sessions are initialized in a fixed order: the installation directory first (it
//! locates the reference data and the tools), then the input loci, then the parameters.
//! A run can only start after a parameter set has been committed.

#[doc(hidden)]
pub mod args;

#[doc(hidden)]
pub mod io;

#[doc(hidden)]
pub mod utils;

#[doc(hidden)]
pub mod error;

/// User facing notices
pub mod notice;

/// Parameter files
pub mod parameters;

/// Input dialect and locus resolution
pub mod loci;

/// Installed IPD-IMGT/HLA reference data
pub mod reference;

/// External process handling shared by the orchestrators
pub mod process;

/// Reference data update orchestration
pub mod data_update;

/// Estimation run orchestration
pub mod estimation;

/// Result ingestion and display selection
pub mod results;

/// Session context shared by the front-ends
pub mod session;

#[cfg(feature = "clap")]
pub mod clap;
