// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The log parser: header discovery, frame decoding and resynchronization.
//!
//! # Stream Structure
//!
//! ```text
//! +--------------------------------------------------------------+
//! | H <key>:<value>\n  ... header lines ...                      |
//! +--------------------------------------------------------------+
//! | I <payload> | P <payload> | P ... | G | H | E | I | P ...    |
//! +--------------------------------------------------------------+
//! ```
//!
//! Frames carry no length prefix; a frame ends where the next recognized
//! tag byte (or clean end of data) begins. When the byte after a frame is
//! not a recognized tag, or the frame ran oversized, the frame is judged
//! corrupt and scanning resumes one byte past its tag — that one-byte
//! rewind is what lets the decoder find the next good frame inside damaged
//! or truncated regions.
//!
//! Decoded frames are delivered through a [`FrameSink`] exactly once per
//! frame in file order, corrupt ones included (with no payload). The frame
//! slice handed to the sink aliases the decoder's history slot and is only
//! valid for the duration of the callback.

use crate::config::SysConfig;
use crate::event::{self, LogEvent};
use crate::header;
use crate::history::{GpsHomeHistory, HistoryRing};
use crate::predictor::{self, PredictorContext};
use crate::schema::{Encoding, FrameDef, FrameDefs, FrameKind, Predictor};
use crate::stats::LogStats;
use bbx_stream::{sign_extend_14bit, ByteStream};
use thiserror::Error;

/// Upper bound on the size of any single frame, in bytes.
pub const FLIGHT_LOG_MAX_FRAME_LENGTH: usize = 256;

/// Largest believable iteration advance between consecutive main frames.
pub const MAXIMUM_ITERATION_JUMP: i64 = 5_000;

/// Largest believable time advance between consecutive main frames, in
/// microseconds.
pub const MAXIMUM_TIME_JUMP: i64 = 10_000_000;

/// Main-field index of the loop iteration counter.
pub const FIELD_INDEX_ITERATION: usize = 0;

/// Main-field index of the timestamp.
pub const FIELD_INDEX_TIME: usize = 1;

/// Identification line a recorder writes ahead of each log; log indexers
/// scan for it to locate session starts.
pub const LOG_START_MARKER: &[u8] = b"H Product:Blackbox flight data recorder by Nicholas Sherlock\n";

/// Fatal decode errors.
///
/// Corruption inside the frame stream is *not* an error: it is reported
/// through the sink and the statistics while the parser resynchronizes.
/// Only an unusable schema aborts the parse.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The header never declared the main field set.
    #[error("log header is missing the main field definitions")]
    MissingFieldDefinitions,

    /// The header declared fields but not how to decode them.
    #[error("log header is missing predictor or encoding vectors for {frame_kind} frames")]
    MissingFrameSchema { frame_kind: FrameKind },

    /// A field has no encoding entry.
    #[error("field #{field} has no encoding declared")]
    MissingEncoding { field: usize },

    /// A field has no predictor entry.
    #[error("field #{field} has no predictor declared")]
    MissingPredictor { field: usize },

    /// An encoding ID outside the wire set.
    #[error("unsupported field encoding {id} for field #{field}")]
    UnsupportedEncoding { id: u32, field: usize },

    /// A predictor ID outside the wire set.
    #[error("unsupported field predictor {id} for field #{field}")]
    UnsupportedPredictor { id: u32, field: usize },

    /// A predictor needs a field the log never declared.
    #[error("field prediction references {field_name}, which the log never declared")]
    MissingReferenceField { field_name: &'static str },
}

/// Observer for completed frames.
///
/// Invoked synchronously, exactly once per frame in file order. `frame` is
/// a borrowed view into the decoder's own history slot: copy it before
/// returning if it needs to outlive the call. Corrupt and event frames
/// carry no payload.
pub trait FrameSink {
    fn on_frame_ready(
        &mut self,
        valid: bool,
        frame: Option<&[i64]>,
        kind: FrameKind,
        frame_start: usize,
        frame_size: usize,
    );
}

impl<F> FrameSink for F
where
    F: FnMut(bool, Option<&[i64]>, FrameKind, usize, usize),
{
    fn on_frame_ready(
        &mut self,
        valid: bool,
        frame: Option<&[i64]>,
        kind: FrameKind,
        frame_start: usize,
        frame_size: usize,
    ) {
        self(valid, frame, kind, frame_start, frame_size)
    }
}

/// Decoder for one log section.
///
/// Drive it with [`LogParser::parse_header`] followed by
/// [`LogParser::parse_log_data`]; decoded frames arrive at the sink. The
/// byte buffer stays owned by the caller, the parser only keeps a
/// positioned view. One instance decodes one log at a time; independent
/// logs get independent instances.
pub struct LogParser<'a> {
    stream: ByteStream<'a>,
    sys_config: SysConfig,
    frame_defs: FrameDefs,
    main_history: HistoryRing,
    gps_home: GpsHomeHistory,
    gps_frame: Vec<i64>,
    last_event: Option<LogEvent>,
    last_main_frame_iteration: i64,
    last_main_frame_time: i64,
    main_stream_is_valid: bool,
    gps_home_is_valid: bool,
    last_skipped_frames: i64,
    /// Where the frame stream begins: one past the header.
    data_begin: usize,
    stats: LogStats,
}

impl<'a> LogParser<'a> {
    /// Create a parser over a caller-owned log buffer.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            stream: ByteStream::new(data),
            sys_config: SysConfig::default(),
            frame_defs: FrameDefs::default(),
            main_history: HistoryRing::new(0),
            gps_home: GpsHomeHistory::new(0),
            gps_frame: Vec::new(),
            last_event: None,
            last_main_frame_iteration: -1,
            last_main_frame_time: -1,
            main_stream_is_valid: false,
            gps_home_is_valid: false,
            last_skipped_frames: 0,
            data_begin: 0,
            stats: LogStats::default(),
        }
    }

    /// System configuration discovered by the last header parse.
    #[must_use]
    pub fn sys_config(&self) -> &SysConfig {
        &self.sys_config
    }

    /// Decode statistics.
    #[must_use]
    pub fn stats(&self) -> &LogStats {
        &self.stats
    }

    /// Frame schema discovered by the last header parse.
    #[must_use]
    pub fn frame_defs(&self) -> &FrameDefs {
        &self.frame_defs
    }

    /// The most recent event record, if any.
    #[must_use]
    pub fn last_event(&self) -> Option<&LogEvent> {
        self.last_event.as_ref()
    }

    /// Main (I/P) field names in wire order.
    #[must_use]
    pub fn main_field_names(&self) -> &[String] {
        &self.frame_defs.intra.names
    }

    /// Number of main fields.
    #[must_use]
    pub fn main_field_count(&self) -> usize {
        self.frame_defs.intra.count()
    }

    /// Wire-order index of a main field.
    #[must_use]
    pub fn main_field_index(&self, name: &str) -> Option<usize> {
        self.frame_defs.intra.index_of(name)
    }

    /// GPS field names in wire order.
    #[must_use]
    pub fn gps_field_names(&self) -> &[String] {
        &self.frame_defs.gps.names
    }

    /// Number of GPS fields.
    #[must_use]
    pub fn gps_field_count(&self) -> usize {
        self.frame_defs.gps.count()
    }

    /// Wire-order index of a GPS field.
    #[must_use]
    pub fn gps_field_index(&self, name: &str) -> Option<usize> {
        self.frame_defs.gps.index_of(name)
    }

    /// GPS home field names in wire order.
    #[must_use]
    pub fn gps_home_field_names(&self) -> &[String] {
        &self.frame_defs.gps_home.names
    }

    /// Number of GPS home fields.
    #[must_use]
    pub fn gps_home_field_count(&self) -> usize {
        self.frame_defs.gps_home.count()
    }

    /// Wire-order index of a GPS home field.
    #[must_use]
    pub fn gps_home_field_index(&self, name: &str) -> Option<usize> {
        self.frame_defs.gps_home.index_of(name)
    }

    /// Clear all statistics.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Forget the discovered schema, configuration, history and statistics.
    pub fn reset_state(&mut self) {
        self.sys_config = SysConfig::default();
        self.frame_defs = FrameDefs::default();
        self.main_history = HistoryRing::new(0);
        self.gps_home = GpsHomeHistory::new(0);
        self.gps_frame = Vec::new();
        self.data_begin = 0;
        self.reset_data_state();
        self.reset_stats();
    }

    fn reset_data_state(&mut self) {
        self.main_history.reset();
        self.gps_home.reset();
        self.gps_frame.fill(0);
        self.last_event = None;
        self.last_main_frame_iteration = -1;
        self.last_main_frame_time = -1;
        self.main_stream_is_valid = false;
        self.gps_home_is_valid = false;
        self.last_skipped_frames = 0;
    }

    /// Parse the header section at `start` (default: current window start),
    /// populating the system configuration and frame schema and sizing the
    /// history buffers.
    ///
    /// # Errors
    ///
    /// Fails if the header never declares the main field set, or declares
    /// it without predictor/encoding vectors for I- or P-frames.
    pub fn parse_header(
        &mut self,
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<(), ParseError> {
        self.reset_state();

        if let Some(start) = start {
            self.stream.start = start.min(self.stream.data_len());
        }
        if let Some(end) = end {
            self.stream.end = end.min(self.stream.data_len());
        }
        self.stream.pos = self.stream.start;
        self.stream.eof = false;

        loop {
            match self.stream.read_char() {
                Some(b'H') => header::parse_header_line(
                    &mut self.stream,
                    &mut self.sys_config,
                    &mut self.frame_defs,
                ),
                None => break,
                Some(_) => {
                    // Frame data begins here
                    self.stream.unread_char();
                    break;
                }
            }
        }

        self.data_begin = self.stream.pos;

        if self.frame_defs.intra.count() == 0 {
            return Err(ParseError::MissingFieldDefinitions);
        }
        if self.frame_defs.intra.predictors.is_empty() || self.frame_defs.intra.encodings.is_empty()
        {
            return Err(ParseError::MissingFrameSchema {
                frame_kind: FrameKind::Intra,
            });
        }
        if self.frame_defs.inter.predictors.is_empty() || self.frame_defs.inter.encodings.is_empty()
        {
            return Err(ParseError::MissingFrameSchema {
                frame_kind: FrameKind::Inter,
            });
        }

        header::finalize_defs(&mut self.frame_defs);

        tracing::debug!(
            main_fields = self.frame_defs.intra.count(),
            gps_fields = self.frame_defs.gps.count(),
            gps_home_fields = self.frame_defs.gps_home.count(),
            data_version = self.sys_config.data_version,
            "log header parsed"
        );

        self.main_history = HistoryRing::new(self.frame_defs.intra.count());
        self.gps_home = GpsHomeHistory::new(self.frame_defs.gps_home.count());
        self.gps_frame = vec![0; self.frame_defs.gps.count()];

        Ok(())
    }

    /// Decode the frame stream in `[start, end)` (defaulting to the current
    /// window), delivering every frame to `sink` in file order.
    ///
    /// With `raw` set, predictors are suppressed and the sink receives the
    /// wire deltas themselves; validity gating is suspended accordingly.
    ///
    /// # Errors
    ///
    /// Only schema-level problems (unknown predictor or encoding IDs,
    /// prediction against undeclared fields) abort the parse. Corruption is
    /// reported through the sink and the statistics instead.
    pub fn parse_log_data(
        &mut self,
        raw: bool,
        start: Option<usize>,
        end: Option<usize>,
        sink: &mut dyn FrameSink,
    ) -> Result<(), ParseError> {
        if let Some(end) = end {
            self.stream.end = end.min(self.stream.data_len());
        }
        let start_pos = start.unwrap_or(self.data_begin);
        self.stream.pos = start_pos;
        self.stream.eof = false;

        let mut last_frame_kind: Option<FrameKind> = None;
        let mut frame_start = start_pos;
        let mut premature_eof = false;

        loop {
            let command = self.stream.read_char();

            if let Some(kind) = last_frame_kind {
                // A consumed byte belongs to the next frame, not this one
                let frame_end = match command {
                    Some(_) => self.stream.pos - 1,
                    None => self.stream.pos,
                };
                let last_frame_size = frame_end - frame_start;

                // A frame terminated cleanly if what follows is a
                // recognized tag, or the data ran out without the frame
                // itself being cut short.
                let looks_complete = match command {
                    Some(tag) => FrameKind::from_tag(tag).is_some(),
                    None => !premature_eof,
                };

                if looks_complete && last_frame_size <= FLIGHT_LOG_MAX_FRAME_LENGTH {
                    let accepted = self.complete_frame(kind, raw, frame_start, frame_end, sink);

                    let frame_stats = self.stats.frame_mut(kind);
                    if accepted {
                        frame_stats.bytes += last_frame_size as u64;
                        frame_stats.size_count[last_frame_size] += 1;
                        frame_stats.valid_count += 1;
                    } else {
                        frame_stats.desync_count += 1;
                    }
                } else {
                    self.main_stream_is_valid = false;
                    self.stats.frame_mut(kind).corrupt_count += 1;
                    self.stats.total_corrupt_frames += 1;

                    tracing::warn!(
                        kind = %kind,
                        offset = frame_start,
                        size = last_frame_size,
                        "corrupt frame, resynchronizing"
                    );

                    // The payload is worthless, don't hand it out
                    sink.on_frame_ready(false, None, kind, frame_start, last_frame_size);

                    // Resume the tag scan one byte into the corrupt frame:
                    // if it was merely truncated, the next frame's tag is
                    // somewhere inside it.
                    self.stream.pos = frame_start + 1;
                    last_frame_kind = None;
                    premature_eof = false;
                    self.stream.eof = false;
                    continue;
                }
            }

            let Some(tag) = command else {
                break;
            };

            frame_start = self.stream.pos - 1;

            match FrameKind::from_tag(tag) {
                Some(kind) => {
                    last_frame_kind = Some(kind);
                    self.parse_frame(kind, raw)?;
                    if self.stream.eof {
                        premature_eof = true;
                    }
                }
                None => {
                    self.main_stream_is_valid = false;
                    last_frame_kind = None;
                }
            }
        }

        self.stats.total_bytes += (self.stream.pos - start_pos) as u64;

        Ok(())
    }

    fn parse_frame(&mut self, kind: FrameKind, raw: bool) -> Result<(), ParseError> {
        match kind {
            FrameKind::Intra => self.parse_intra_frame(raw),
            FrameKind::Inter => self.parse_inter_frame(raw),
            FrameKind::Gps => self.parse_gps_frame(raw),
            FrameKind::GpsHome => self.parse_gps_home_frame(raw),
            FrameKind::Event => {
                self.last_event = event::parse_event(&mut self.stream);
                Ok(())
            }
        }
    }

    fn parse_intra_frame(&mut self, raw: bool) -> Result<(), ParseError> {
        let ctx = PredictorContext {
            sys: &self.sys_config,
            motor0_index: self.frame_defs.intra.index_of("motor[0]"),
            home_values: self.gps_home.last(),
            home0_index: self.frame_defs.gps_home.index_of("GPS_home[0]"),
            home1_index: self.frame_defs.gps_home.index_of("GPS_home[1]"),
            last_main_frame_time: self.last_main_frame_time,
        };

        // A keyframe may only reach one frame back
        let (current, previous, _) = self.main_history.decode_views();

        decode_fields(
            &mut self.stream,
            &self.frame_defs.intra,
            self.sys_config.data_version,
            raw,
            0,
            &ctx,
            current,
            previous,
            None,
        )
    }

    fn parse_inter_frame(&mut self, raw: bool) -> Result<(), ParseError> {
        self.last_skipped_frames = self.count_intentionally_skipped_frames();

        let ctx = PredictorContext {
            sys: &self.sys_config,
            motor0_index: self.frame_defs.intra.index_of("motor[0]"),
            home_values: self.gps_home.last(),
            home0_index: self.frame_defs.gps_home.index_of("GPS_home[0]"),
            home1_index: self.frame_defs.gps_home.index_of("GPS_home[1]"),
            last_main_frame_time: self.last_main_frame_time,
        };

        let skipped = self.last_skipped_frames;
        let (current, previous, previous2) = self.main_history.decode_views();

        decode_fields(
            &mut self.stream,
            &self.frame_defs.inter,
            self.sys_config.data_version,
            raw,
            skipped,
            &ctx,
            current,
            previous,
            previous2,
        )
    }

    fn parse_gps_frame(&mut self, raw: bool) -> Result<(), ParseError> {
        if self.frame_defs.gps.count() == 0 {
            return Ok(());
        }

        let ctx = PredictorContext {
            sys: &self.sys_config,
            motor0_index: self.frame_defs.intra.index_of("motor[0]"),
            home_values: self.gps_home.last(),
            home0_index: self.frame_defs.gps_home.index_of("GPS_home[0]"),
            home1_index: self.frame_defs.gps_home.index_of("GPS_home[1]"),
            last_main_frame_time: self.last_main_frame_time,
        };

        decode_fields(
            &mut self.stream,
            &self.frame_defs.gps,
            self.sys_config.data_version,
            raw,
            0,
            &ctx,
            &mut self.gps_frame,
            None,
            None,
        )
    }

    fn parse_gps_home_frame(&mut self, raw: bool) -> Result<(), ParseError> {
        if self.frame_defs.gps_home.count() == 0 {
            return Ok(());
        }

        let home0_index = self.frame_defs.gps_home.index_of("GPS_home[0]");
        let home1_index = self.frame_defs.gps_home.index_of("GPS_home[1]");
        let (scratch, last) = self.gps_home.split_mut();

        let ctx = PredictorContext {
            sys: &self.sys_config,
            motor0_index: self.frame_defs.intra.index_of("motor[0]"),
            home_values: last,
            home0_index,
            home1_index,
            last_main_frame_time: self.last_main_frame_time,
        };

        decode_fields(
            &mut self.stream,
            &self.frame_defs.gps_home,
            self.sys_config.data_version,
            raw,
            0,
            &ctx,
            scratch,
            None,
            None,
        )
    }

    fn complete_frame(
        &mut self,
        kind: FrameKind,
        raw: bool,
        frame_start: usize,
        frame_end: usize,
        sink: &mut dyn FrameSink,
    ) -> bool {
        match kind {
            FrameKind::Intra => self.complete_intra_frame(raw, frame_start, frame_end, sink),
            FrameKind::Inter => self.complete_inter_frame(raw, frame_start, frame_end, sink),
            FrameKind::Gps => self.complete_gps_frame(frame_start, frame_end, sink),
            FrameKind::GpsHome => self.complete_gps_home_frame(frame_start, frame_end, sink),
            FrameKind::Event => self.complete_event_frame(frame_start, frame_end, sink),
        }
    }

    fn complete_intra_frame(
        &mut self,
        raw: bool,
        frame_start: usize,
        frame_end: usize,
        sink: &mut dyn FrameSink,
    ) -> bool {
        let iteration = self.current_field(FIELD_INDEX_ITERATION);
        let time = self.current_field(FIELD_INDEX_TIME);

        // With an earlier frame on record, iteration and time must move
        // forward, and not by an implausible amount
        let accept = raw
            || self.last_main_frame_iteration == -1
            || (iteration > self.last_main_frame_iteration
                && iteration < self.last_main_frame_iteration + MAXIMUM_ITERATION_JUMP
                && time >= self.last_main_frame_time
                && time < self.last_main_frame_time + MAXIMUM_TIME_JUMP);

        if accept {
            self.stats.intentionally_absent_iterations +=
                self.count_intentionally_skipped_frames_to(iteration);

            self.last_main_frame_iteration = iteration;
            self.last_main_frame_time = time;
            self.main_stream_is_valid = true;

            self.stats.update_fields(self.main_history.current());
        } else {
            tracing::debug!(iteration, time, "keyframe rejected by validity gate");
            self.invalidate_main_stream();
        }

        sink.on_frame_ready(
            self.main_stream_is_valid,
            Some(self.main_history.current()),
            FrameKind::Intra,
            frame_start,
            frame_end - frame_start,
        );

        // A keyframe is the oldest state any predictor may reach, so it
        // seeds both history slots
        self.main_history.rotate_intra();

        true
    }

    fn complete_inter_frame(
        &mut self,
        raw: bool,
        frame_start: usize,
        frame_end: usize,
        sink: &mut dyn FrameSink,
    ) -> bool {
        let iteration = self.current_field(FIELD_INDEX_ITERATION);
        let time = self.current_field(FIELD_INDEX_TIME);

        if self.main_stream_is_valid
            && !raw
            && !(iteration > self.last_main_frame_iteration
                && iteration <= self.last_main_frame_iteration + MAXIMUM_ITERATION_JUMP
                && time >= self.last_main_frame_time
                && time <= self.last_main_frame_time + MAXIMUM_TIME_JUMP)
        {
            self.main_stream_is_valid = false;
        }

        if self.main_stream_is_valid {
            self.last_main_frame_iteration = iteration;
            self.last_main_frame_time = time;

            self.stats.intentionally_absent_iterations += self.last_skipped_frames as u64;
            self.stats.update_fields(self.main_history.current());
        }

        // A delta frame can never bring an invalid stream back; only a
        // keyframe does that

        sink.on_frame_ready(
            self.main_stream_is_valid,
            Some(self.main_history.current()),
            FrameKind::Inter,
            frame_start,
            frame_end - frame_start,
        );

        if self.main_stream_is_valid {
            self.main_history.rotate_inter();
        }

        true
    }

    fn complete_gps_frame(
        &mut self,
        frame_start: usize,
        frame_end: usize,
        sink: &mut dyn FrameSink,
    ) -> bool {
        // Positions are home-relative, so they are only meaningful once a
        // home frame has been seen
        if self.frame_defs.gps.count() == 0 {
            sink.on_frame_ready(false, None, FrameKind::Gps, frame_start, frame_end - frame_start);
        } else {
            sink.on_frame_ready(
                self.gps_home_is_valid,
                Some(&self.gps_frame),
                FrameKind::Gps,
                frame_start,
                frame_end - frame_start,
            );
        }
        true
    }

    fn complete_gps_home_frame(
        &mut self,
        frame_start: usize,
        frame_end: usize,
        sink: &mut dyn FrameSink,
    ) -> bool {
        if self.frame_defs.gps_home.count() == 0 {
            sink.on_frame_ready(
                false,
                None,
                FrameKind::GpsHome,
                frame_start,
                frame_end - frame_start,
            );
            return true;
        }

        self.gps_home.commit();
        self.gps_home_is_valid = true;

        sink.on_frame_ready(
            true,
            Some(self.gps_home.last()),
            FrameKind::GpsHome,
            frame_start,
            frame_end - frame_start,
        );

        true
    }

    fn complete_event_frame(
        &mut self,
        frame_start: usize,
        frame_end: usize,
        sink: &mut dyn FrameSink,
    ) -> bool {
        if self.last_event.is_some() {
            sink.on_frame_ready(
                true,
                None,
                FrameKind::Event,
                frame_start,
                frame_end - frame_start,
            );
            true
        } else {
            false
        }
    }

    fn current_field(&self, index: usize) -> i64 {
        self.main_history.current().get(index).copied().unwrap_or(0)
    }

    fn invalidate_main_stream(&mut self) {
        self.main_stream_is_valid = false;
        self.main_history.invalidate_history();
    }

    /// Did the logger intend to record a frame at this iteration, given its
    /// keyframe interval and sampling fraction?
    fn should_have_frame(&self, iteration: i64) -> bool {
        (iteration % self.sys_config.frame_interval_i + self.sys_config.frame_interval_p_num - 1)
            % self.sys_config.frame_interval_p_denom
            < self.sys_config.frame_interval_p_num
    }

    /// Length of the run of intentionally unlogged iterations immediately
    /// after the last main frame.
    fn count_intentionally_skipped_frames(&self) -> i64 {
        if self.last_main_frame_iteration == -1 {
            // Haven't parsed a frame yet, nothing has been skipped
            return 0;
        }

        let mut count = 0;
        let mut index = self.last_main_frame_iteration + 1;
        while !self.should_have_frame(index) {
            count += 1;
            index += 1;
        }
        count
    }

    /// Intentionally unlogged iterations strictly between the last main
    /// frame and `target`.
    fn count_intentionally_skipped_frames_to(&self, target: i64) -> u64 {
        if self.last_main_frame_iteration == -1 {
            return 0;
        }

        ((self.last_main_frame_iteration + 1)..target)
            .filter(|&index| !self.should_have_frame(index))
            .count() as u64
    }
}

/// Decode every field of one frame: read the wire encoding, then apply the
/// field's predictor (suppressed when `raw`). Group encodings decode
/// several consecutive fields from one read.
#[allow(clippy::too_many_arguments)]
fn decode_fields(
    stream: &mut ByteStream<'_>,
    def: &FrameDef,
    data_version: u32,
    raw: bool,
    skipped_frames: i64,
    ctx: &PredictorContext<'_>,
    current: &mut [i64],
    previous: Option<&[i64]>,
    previous2: Option<&[i64]>,
) -> Result<(), ParseError> {
    let count = def.count();
    let mut i = 0;

    while i < count {
        let predictor_id = *def
            .predictors
            .get(i)
            .ok_or(ParseError::MissingPredictor { field: i })?;

        // The iteration counter is synthesized from history and the skip
        // count; it has no wire payload
        if predictor_id == Predictor::Inc.id() {
            current[i] = previous.map_or(0, |prev| prev[i]) + skipped_frames + 1;
            i += 1;
            continue;
        }

        let encoding_id = *def
            .encodings
            .get(i)
            .ok_or(ParseError::MissingEncoding { field: i })?;
        let encoding = Encoding::from_id(encoding_id).ok_or(ParseError::UnsupportedEncoding {
            id: encoding_id,
            field: i,
        })?;

        match encoding {
            Encoding::SignedVb | Encoding::UnsignedVb | Encoding::Neg14Bit | Encoding::Null => {
                let value = match encoding {
                    Encoding::SignedVb => i64::from(stream.read_signed_vb()),
                    Encoding::UnsignedVb => i64::from(stream.read_unsigned_vb()),
                    Encoding::Neg14Bit => -i64::from(sign_extend_14bit(stream.read_unsigned_vb())),
                    _ => 0,
                };

                let applied_id = if raw { Predictor::None.id() } else { predictor_id };
                current[i] =
                    predictor::apply(ctx, applied_id, i, value, current, previous, previous2)?;
                i += 1;
            }
            Encoding::Tag8_4S16 => {
                let mut values = [0i32; 4];
                if data_version < 2 {
                    stream.read_tag8_4s16_v1(&mut values);
                } else {
                    stream.read_tag8_4s16_v2(&mut values);
                }
                i = apply_group(def, raw, ctx, current, previous, previous2, i, &values)?;
            }
            Encoding::Tag2_3S32 => {
                let mut values = [0i32; 3];
                stream.read_tag2_3s32(&mut values);
                i = apply_group(def, raw, ctx, current, previous, previous2, i, &values)?;
            }
            Encoding::Tag8_8Svb => {
                // The group spans the run of adjacent fields that share
                // this encoding, up to eight
                let mut group_count = 1;
                while group_count < 8
                    && i + group_count < count
                    && def.encodings.get(i + group_count) == Some(&Encoding::Tag8_8Svb.id())
                {
                    group_count += 1;
                }

                let mut values = [0i32; 8];
                stream.read_tag8_8svb(&mut values, group_count);

                i = apply_group(
                    def,
                    raw,
                    ctx,
                    current,
                    previous,
                    previous2,
                    i,
                    &values[..group_count],
                )?;
            }
        }
    }

    Ok(())
}

/// Apply per-field predictors to a freshly read group, returning the index
/// past the group.
#[allow(clippy::too_many_arguments)]
fn apply_group(
    def: &FrameDef,
    raw: bool,
    ctx: &PredictorContext<'_>,
    current: &mut [i64],
    previous: Option<&[i64]>,
    previous2: Option<&[i64]>,
    mut i: usize,
    values: &[i32],
) -> Result<usize, ParseError> {
    let count = def.count();

    for &value in values {
        if i >= count {
            break;
        }

        let predictor_id = if raw {
            Predictor::None.id()
        } else {
            *def.predictors
                .get(i)
                .ok_or(ParseError::MissingPredictor { field: i })?
        };

        current[i] =
            predictor::apply(ctx, predictor_id, i, i64::from(value), current, previous, previous2)?;
        i += 1;
    }

    Ok(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned_vb(mut value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            if value < 0x80 {
                out.push(value as u8);
                return out;
            }
            out.push((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
    }

    fn signed_vb(value: i32) -> Vec<u8> {
        unsigned_vb(((value << 1) ^ (value >> 31)) as u32)
    }

    /// Minimal two-field log: loopIteration (unsigned VB), time (unsigned
    /// VB) for I-frames, INC + signed VB for P-frames.
    fn minimal_header() -> Vec<u8> {
        let mut log = Vec::new();
        log.extend_from_slice(LOG_START_MARKER);
        for line in [
            "H Field I name:loopIteration,time",
            "H Field I predictor:0,0",
            "H Field I encoding:1,1",
            "H Field P predictor:6,2",
            "H Field P encoding:9,0",
            "H I interval:32",
            "H P interval:1/1",
        ] {
            log.extend_from_slice(line.as_bytes());
            log.push(b'\n');
        }
        log
    }

    fn intra_frame(iteration: u32, time: u32) -> Vec<u8> {
        let mut out = vec![b'I'];
        out.extend(unsigned_vb(iteration));
        out.extend(unsigned_vb(time));
        out
    }

    fn inter_frame(time_delta: i32) -> Vec<u8> {
        let mut out = vec![b'P'];
        out.extend(signed_vb(time_delta));
        out
    }

    #[derive(Default)]
    struct Collector {
        frames: Vec<(bool, Option<Vec<i64>>, FrameKind)>,
    }

    impl FrameSink for Collector {
        fn on_frame_ready(
            &mut self,
            valid: bool,
            frame: Option<&[i64]>,
            kind: FrameKind,
            _frame_start: usize,
            _frame_size: usize,
        ) {
            self.frames.push((valid, frame.map(<[i64]>::to_vec), kind));
        }
    }

    #[test]
    fn test_header_without_field_names_is_fatal() {
        let data = b"H Field I predictor:0\n".to_vec();
        let mut parser = LogParser::new(&data);
        assert!(matches!(
            parser.parse_header(None, None),
            Err(ParseError::MissingFieldDefinitions)
        ));
    }

    #[test]
    fn test_header_without_inter_schema_is_fatal() {
        let mut data = Vec::new();
        for line in [
            "H Field I name:loopIteration,time",
            "H Field I predictor:0,0",
            "H Field I encoding:1,1",
        ] {
            data.extend_from_slice(line.as_bytes());
            data.push(b'\n');
        }
        let mut parser = LogParser::new(&data);
        assert!(matches!(
            parser.parse_header(None, None),
            Err(ParseError::MissingFrameSchema {
                frame_kind: FrameKind::Inter
            })
        ));
    }

    #[test]
    fn test_minimal_log_decodes() {
        let mut log = minimal_header();
        log.extend(intra_frame(0, 1000));
        log.extend(inter_frame(10)); // time = 2*1000 - 1000 + 10 = 1010
        log.extend(inter_frame(0)); // straight line: 2*1010 - 1000 = 1020

        let mut parser = LogParser::new(&log);
        parser.parse_header(None, None).expect("header");
        assert_eq!(parser.main_field_count(), 2);

        let mut sink = Collector::default();
        parser.parse_log_data(false, None, None, &mut sink).expect("data");

        assert_eq!(sink.frames.len(), 3);
        assert_eq!(
            sink.frames[0],
            (true, Some(vec![0, 1000]), FrameKind::Intra)
        );
        assert_eq!(
            sink.frames[1],
            (true, Some(vec![1, 1010]), FrameKind::Inter)
        );
        assert_eq!(
            sink.frames[2],
            (true, Some(vec![2, 1020]), FrameKind::Inter)
        );

        let stats = parser.stats();
        assert_eq!(stats.frame(FrameKind::Intra).valid_count, 1);
        assert_eq!(stats.frame(FrameKind::Inter).valid_count, 2);
        assert_eq!(stats.total_corrupt_frames, 0);
    }

    #[test]
    fn test_junk_after_frame_marks_it_corrupt_and_resyncs() {
        let mut log = minimal_header();
        log.extend(intra_frame(0, 1000));
        log.push(0x00); // not a frame tag
        log.extend(intra_frame(1, 1010));

        let mut parser = LogParser::new(&log);
        parser.parse_header(None, None).expect("header");

        let mut sink = Collector::default();
        parser.parse_log_data(false, None, None, &mut sink).expect("data");

        // The first keyframe's terminator is garbage, so the frame cannot
        // be trusted; the scan resynchronizes onto the second one.
        assert_eq!(sink.frames.len(), 2);
        assert_eq!(sink.frames[0], (false, None, FrameKind::Intra));
        assert_eq!(
            sink.frames[1],
            (true, Some(vec![1, 1010]), FrameKind::Intra)
        );
        assert_eq!(parser.stats().total_corrupt_frames, 1);
    }

    #[test]
    fn test_should_have_frame_sampling_pattern() {
        let log = {
            let mut log = minimal_header();
            log.extend(intra_frame(0, 1000));
            log
        };
        let mut parser = LogParser::new(&log);
        parser.parse_header(None, None).expect("header");
        parser.sys_config.frame_interval_i = 32;
        parser.sys_config.frame_interval_p_num = 1;
        parser.sys_config.frame_interval_p_denom = 4;

        // With 1/4 sampling, every fourth iteration is logged
        assert!(parser.should_have_frame(0));
        assert!(!parser.should_have_frame(1));
        assert!(!parser.should_have_frame(2));
        assert!(!parser.should_have_frame(3));
        assert!(parser.should_have_frame(4));

        parser.last_main_frame_iteration = 100;
        assert_eq!(parser.count_intentionally_skipped_frames(), 3);
        assert_eq!(parser.count_intentionally_skipped_frames_to(104), 3);
        assert_eq!(parser.count_intentionally_skipped_frames_to(101), 0);
    }

    #[test]
    fn test_reset_and_reparse_is_deterministic() {
        let mut log = minimal_header();
        log.extend(intra_frame(0, 1000));
        log.extend(inter_frame(5));
        log.extend(intra_frame(64, 3000));

        let mut first = Collector::default();
        let mut second = Collector::default();

        let mut parser = LogParser::new(&log);
        parser.parse_header(None, None).expect("header");
        parser.parse_log_data(false, None, None, &mut first).expect("data");
        let first_bytes = parser.stats().total_bytes;

        parser.reset_state();
        parser.parse_header(None, None).expect("header again");
        parser.parse_log_data(false, None, None, &mut second).expect("data again");

        assert_eq!(first.frames, second.frames);
        assert_eq!(parser.stats().total_bytes, first_bytes);
    }
}
