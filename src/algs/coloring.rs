//! Distributed greedy colouring of the processor graph.
//!
//! Two processors are adjacent when they share an interface. Every guess gives
//! each processor a pseudo-random weight; a processor waits for the colours of
//! all heavier neighbours, takes the smallest colour none of them uses, and
//! passes it on to its lighter neighbours. The resulting colouring is proper
//! and uses at most `max_degree + 1` colours. Several guesses are tried and
//! the one with the smallest global maximum colour is kept.
//!
//! Runs directly on channels, not through interface exchange, so it can be
//! used before any interface data exists. Every rank must call it, including
//! ranks without neighbours, because each guess ends with a global reduction.

use crate::algs::communicator::{Channel, CommStatus, Communicator, Wait};
use crate::algs::wire::{WireColor, WireWeight, cast_slice, read_record};
use crate::ddd_error::DddError;
use crate::interface::definition::InterfaceId;
use crate::interface::registry::InterfaceRegistry;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::mem::size_of;

/// How a processor learns its neighbours' weights.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightSource {
    /// Evaluate the neighbours' weight function locally.
    Computed,
    /// Exchange weights in an explicit round trip.
    Exchanged,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColoringConfig {
    pub seed: u64,
    pub max_guesses: u32,
    pub max_neighbors: usize,
    pub weights: WeightSource,
    /// Guess `g` uses tags `tag_base + 2g` (weights) and `tag_base + 2g + 1` (colours).
    pub tag_base: u16,
}

impl Default for ColoringConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed_c010,
            max_guesses: 10,
            max_neighbors: 1024,
            weights: WeightSource::Computed,
            tag_base: 0x4000,
        }
    }
}

/// Final colour of this processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coloring {
    pub color: u32,
    /// Largest colour over all processors.
    pub max_color: u32,
    /// Guess that produced this colouring.
    pub guess: u32,
}

/// Progress of one guess.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorState {
    ComputingWeight,
    Exchanging,
    Colored,
}

/// Weight of processor `rank` in guess `guess`; identical on every processor.
pub fn weight(rank: usize, guess: u32, seed: u64) -> u64 {
    let mix = seed ^ (rank as u64).rotate_left(32) ^ u64::from(guess);
    SmallRng::seed_from_u64(mix).r#gen::<u64>()
}

/// Smallest non-negative colour absent from `sorted` (ascending, may repeat).
pub fn first_free_color(sorted: &[u32]) -> u32 {
    let mut c = 0;
    for &x in sorted {
        if x == c {
            c += 1;
        } else if x > c {
            break;
        }
    }
    c
}

struct Guess<'a, C: Communicator> {
    comm: &'a C,
    cfg: &'a ColoringConfig,
    channels: Vec<Channel>,
    guess: u32,
    state: ColorState,
}

impl<'a, C: Communicator> Guess<'a, C> {
    fn weight_tag(&self) -> u16 {
        self.cfg
            .tag_base
            .wrapping_add((self.guess as u16).wrapping_mul(2))
    }

    fn color_tag(&self) -> u16 {
        self.weight_tag().wrapping_add(1)
    }

    fn neighbour_weights(&self) -> Result<Vec<u64>, DddError> {
        match self.cfg.weights {
            WeightSource::Computed => Ok(self
                .channels
                .iter()
                .map(|ch| weight(ch.peer, self.guess, self.cfg.seed))
                .collect()),
            WeightSource::Exchanged => {
                let tag = self.weight_tag();
                let mine = WireWeight::new(weight(self.comm.rank(), self.guess, self.cfg.seed));
                let recvs: Vec<_> = self
                    .channels
                    .iter()
                    .map(|&ch| self.comm.irecv(ch, tag, size_of::<WireWeight>()))
                    .collect();
                let sends: Vec<_> = self
                    .channels
                    .iter()
                    .map(|&ch| self.comm.isend(ch, tag, cast_slice(std::slice::from_ref(&mine))))
                    .collect();
                let mut out = Vec::with_capacity(recvs.len());
                for (ch, h) in self.channels.iter().zip(recvs) {
                    out.push(decode::<WireWeight>(ch.peer, "recv weight", h.wait()?)?.get());
                }
                for s in sends {
                    s.wait()?;
                }
                Ok(out)
            }
        }
    }

    fn run(mut self) -> Result<u32, DddError> {
        let rank = self.comm.rank();
        let my_weight = weight(rank, self.guess, self.cfg.seed);

        for &ch in &self.channels {
            self.comm.connect(ch).wait()?;
        }
        self.state = ColorState::Exchanging;
        let weights = self.neighbour_weights()?;

        // heavier neighbours colour first; ties cannot happen in practice
        let mut heavier = Vec::new();
        let mut lighter = Vec::new();
        for (&ch, &w) in self.channels.iter().zip(&weights) {
            debug_assert_ne!(
                w, my_weight,
                "equal colouring weights on ranks {rank} and {}",
                ch.peer
            );
            if (w, ch.peer) > (my_weight, rank) {
                heavier.push(ch);
            } else {
                lighter.push(ch);
            }
        }

        let tag = self.color_tag();
        let mut pending: Vec<(usize, C::Handle)> = heavier
            .iter()
            .map(|&ch| (ch.peer, self.comm.irecv(ch, tag, size_of::<WireColor>())))
            .collect();
        let mut colors = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let mut i = 0;
            while i < pending.len() {
                match pending[i].1.poll() {
                    CommStatus::Pending => i += 1,
                    CommStatus::Done(data) => {
                        let (peer, _) = pending.swap_remove(i);
                        colors.push(decode::<WireColor>(peer, "recv color", data)?.get());
                    }
                    CommStatus::Failed(e) => return Err(e),
                }
            }
            std::thread::yield_now();
        }
        colors.sort_unstable();
        let color = first_free_color(&colors);

        let out = WireColor::new(color);
        let sends: Vec<_> = lighter
            .iter()
            .map(|&ch| self.comm.isend(ch, tag, cast_slice(std::slice::from_ref(&out))))
            .collect();
        for s in sends {
            s.wait()?;
        }
        let closing: Vec<_> = self.channels.iter().map(|&ch| self.comm.disconnect(ch)).collect();
        for d in closing {
            d.wait()?;
        }
        self.state = ColorState::Colored;
        log::trace!(
            "rank {rank} guess {}: weight {my_weight:#x}, {} heavier, colour {color}",
            self.guess,
            heavier.len()
        );
        debug_assert_eq!(self.state, ColorState::Colored);
        Ok(color)
    }
}

fn decode<T: bytemuck::Pod>(
    peer: usize,
    op: &'static str,
    data: Option<Vec<u8>>,
) -> Result<T, DddError> {
    let data = data.ok_or_else(|| DddError::protocol(peer, op, "no payload"))?;
    read_record(&data).map_err(|reason| DddError::protocol(peer, op, reason))
}

/// Colour this processor against `neighbours` (deduplicated, self excluded).
pub fn color_processors<C: Communicator>(
    comm: &C,
    neighbours: &[usize],
    cfg: &ColoringConfig,
) -> Result<Coloring, DddError> {
    let mut nbrs = neighbours.to_vec();
    nbrs.sort_unstable();
    nbrs.dedup();
    nbrs.retain(|&p| p != comm.rank());
    if nbrs.len() > cfg.max_neighbors {
        log::warn!(
            "rank {} has {} neighbours, colouring supports {}",
            comm.rank(),
            nbrs.len(),
            cfg.max_neighbors
        );
        return Err(DddError::TooManyNeighbors {
            found: nbrs.len(),
            max: cfg.max_neighbors,
        });
    }

    let mut best: Option<Coloring> = None;
    for guess in 0..cfg.max_guesses.max(1) {
        let channels = comm.open_channels(&nbrs)?;
        let color = Guess {
            comm,
            cfg,
            channels,
            guess,
            state: ColorState::ComputingWeight,
        }
        .run()?;
        let max_color = comm.all_reduce_max(i64::from(color)) as u32;
        if best.is_none_or(|b| max_color < b.max_color) {
            best = Some(Coloring {
                color,
                max_color,
                guess,
            });
        }
        if max_color <= 2 {
            break;
        }
    }
    best.ok_or(DddError::Invariant("colouring ran no guess".to_owned()))
}

/// Colour the processor graph implied by interface `id`.
pub fn color_interface<C: Communicator>(
    registry: &InterfaceRegistry,
    id: InterfaceId,
    comm: &C,
    cfg: &ColoringConfig,
) -> Result<Coloring, DddError> {
    let nbrs = registry.neighbours(id)?;
    color_processors(comm, &nbrs, cfg)
}
