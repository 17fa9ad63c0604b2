// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document search. A bounded retry loop over kernel sizes and edge-map
// refinements, falling back to the whole frame when no page outline is found.

use flatscan_core::{Quadrilateral, ScanConfig};
use image::{DynamicImage, GrayImage};
use tracing::{debug, info, instrument, warn};

use crate::image::resize;
use crate::scan::contour::find_quad;
use crate::scan::edges::extract_edges;
use crate::scan::lines::enhance_edges;
use crate::scan::visualize::{QUAD_TITLE, Visualizer, draw_quad_overlay};

/// How a search ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    /// A large enough four-vertex contour was found.
    Found {
        kernel_size: u32,
        /// 1-based attempt within that kernel size.
        attempt: u32,
        /// Contour area over working-frame area.
        area_fraction: f64,
    },
    /// Nothing qualified; the quad spans the whole image.
    FullFrame,
}

/// Result of [`DocumentLocator::locate`], in source-image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub quad: Quadrilateral,
    pub outcome: SearchOutcome,
    /// Quad-finding passes made.
    pub passes: usize,
}

impl Location {
    pub fn is_full_frame(&self) -> bool {
        self.outcome == SearchOutcome::FullFrame
    }
}

enum SearchState {
    Searching {
        kernel_index: usize,
    },
    Refining {
        kernel_index: usize,
        edges: GrayImage,
        attempt: u32,
    },
    Found {
        quad: Quadrilateral,
        outcome: SearchOutcome,
    },
    NotFound,
}

impl SearchState {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Found { .. } | Self::NotFound)
    }
}

/// Finds the page outline in a photograph.
pub struct DocumentLocator<'a> {
    config: &'a ScanConfig,
    visualizer: Option<&'a dyn Visualizer>,
}

impl<'a> DocumentLocator<'a> {
    pub fn new(config: &'a ScanConfig) -> Self {
        Self {
            config,
            visualizer: None,
        }
    }

    pub fn with_visualizer(mut self, visualizer: Option<&'a dyn Visualizer>) -> Self {
        self.visualizer = visualizer;
        self
    }

    /// Locate the document in `image`.
    ///
    /// Always returns a quad: either the accepted contour scaled back to the
    /// source resolution or the full frame.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn locate(&self, image: &DynamicImage) -> Location {
        let full_frame = Quadrilateral::full_frame(image.width(), image.height());
        let (working, scale) = match resize(image, None, Some(self.config.search.working_height)) {
            Ok(resized) => resized,
            Err(err) => {
                warn!(error = %err, "Cannot build working image; using full frame");
                return Location {
                    quad: full_frame,
                    outcome: SearchOutcome::FullFrame,
                    passes: 0,
                };
            }
        };

        let mut passes = 0;
        let mut state = SearchState::Searching { kernel_index: 0 };
        while !state.is_terminal() {
            state = self.advance(state, &working, &mut passes);
        }

        let (working_quad, location) = match state {
            SearchState::Found { quad, outcome } => {
                info!(?outcome, passes, "Document located");
                let location = Location {
                    quad: quad.unscaled(scale),
                    outcome,
                    passes,
                };
                (quad, location)
            }
            _ => {
                info!(passes, "No document outline found; using full frame");
                let location = Location {
                    quad: full_frame,
                    outcome: SearchOutcome::FullFrame,
                    passes,
                };
                (full_frame.scaled(scale), location)
            }
        };

        if self.config.visualize {
            if let Some(visualizer) = self.visualizer {
                visualizer.show(QUAD_TITLE, &draw_quad_overlay(&working, &working_quad));
            }
        }
        location
    }

    fn advance(&self, state: SearchState, working: &DynamicImage, passes: &mut usize) -> SearchState {
        let search = &self.config.search;
        match state {
            SearchState::Searching { kernel_index } => {
                let Some(&kernel_size) = search.kernel_sizes.get(kernel_index) else {
                    return SearchState::NotFound;
                };
                match extract_edges(working, kernel_size, &self.config.edges) {
                    Ok(edges) => SearchState::Refining {
                        kernel_index,
                        edges,
                        attempt: 1,
                    },
                    Err(err) => {
                        warn!(kernel_size, error = %err, "Edge extraction failed; skipping kernel");
                        SearchState::Searching {
                            kernel_index: kernel_index + 1,
                        }
                    }
                }
            }
            SearchState::Refining {
                kernel_index,
                edges,
                attempt,
            } => {
                *passes += 1;
                let working_area = working.width() as f64 * working.height() as f64;
                let kernel_size = search.kernel_sizes[kernel_index];

                match find_quad(&edges, search.approx_epsilon_fraction) {
                    Some((quad, area)) if area >= search.min_area_fraction * working_area => {
                        SearchState::Found {
                            quad,
                            outcome: SearchOutcome::Found {
                                kernel_size,
                                attempt,
                                area_fraction: area / working_area,
                            },
                        }
                    }
                    candidate => {
                        debug!(
                            kernel_size,
                            attempt,
                            best_area = candidate.map_or(0.0, |(_, area)| area),
                            "No qualifying quad"
                        );
                        if attempt >= search.max_refinements {
                            SearchState::Searching {
                                kernel_index: kernel_index + 1,
                            }
                        } else {
                            SearchState::Refining {
                                kernel_index,
                                edges: enhance_edges(&edges, &self.config.lines),
                                attempt: attempt + 1,
                            }
                        }
                    }
                }
            }
            terminal => terminal,
        }
    }
}
