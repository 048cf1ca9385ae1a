//! Exception handler regions of CIL method bodies (II.25.4.6).
//!
//! On disk a handler is a clause of byte offsets and lengths in one of
//! two encodings (small/fat). Decoded handlers instead delimit their
//! regions with *instruction references* (arena indices), so edits that
//! reflow offsets keep the regions consistent; `try_end`/`handler_end`
//! of `None` mean "end of method".

use bitflags::bitflags;

use crate::metadata::token::Token;

bitflags! {
    /// The clause kind of an exception handler.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed catch clause; `catch_type` holds the exception type.
        const EXCEPTION = 0x0000;
        /// A filter clause; `filter_start` points at the filter code.
        const FILTER = 0x0001;
        /// A finally clause.
        const FINALLY = 0x0002;
        /// A fault clause (finally that only runs on exception).
        const FAULT = 0x0004;
    }
}

/// A decoded try/handler region, delimited by instruction references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// The clause kind.
    pub flags: ExceptionHandlerFlags,
    /// First instruction of the protected region.
    pub try_start: Option<usize>,
    /// First instruction *after* the protected region; `None` means the
    /// region runs to the end of the method.
    pub try_end: Option<usize>,
    /// First instruction of the filter code (filter clauses only).
    pub filter_start: Option<usize>,
    /// First instruction of the handler.
    pub handler_start: Option<usize>,
    /// First instruction *after* the handler; `None` means end of
    /// method.
    pub handler_end: Option<usize>,
    /// The caught exception type (catch clauses only).
    pub catch_type: Option<Token>,
}

impl ExceptionHandler {
    /// Returns `true` for a typed catch clause.
    #[must_use]
    pub fn is_catch(&self) -> bool {
        self.kind_bits() == 0
    }

    /// Returns `true` for a filter clause.
    #[must_use]
    pub fn is_filter(&self) -> bool {
        self.flags.contains(ExceptionHandlerFlags::FILTER)
    }

    /// Returns `true` for a finally clause.
    #[must_use]
    pub fn is_finally(&self) -> bool {
        self.flags.contains(ExceptionHandlerFlags::FINALLY)
    }

    /// Returns `true` for a fault clause.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.flags.contains(ExceptionHandlerFlags::FAULT)
    }

    fn kind_bits(&self) -> u16 {
        self.flags.bits() & 0x0007
    }
}

/// One clause as stored on disk, before instruction resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawExceptionClause {
    pub flags: u16,
    pub try_offset: u32,
    pub try_length: u32,
    pub handler_offset: u32,
    pub handler_length: u32,
    /// Catch type token, filter start offset, or unused - per `flags`.
    pub class_token_or_filter: u32,
}

impl RawExceptionClause {
    /// Returns `true` if the clause describes a well-formed region pair.
    ///
    /// Rejected clauses are *dropped*, never fatal: an empty handler or
    /// try region, a filter that does not start strictly before its
    /// handler, or try/handler regions that partially overlap (exact
    /// containment of one in the other is allowed, a partial overlap is
    /// not).
    pub fn is_well_formed(&self) -> bool {
        if self.handler_length == 0 || self.try_length == 0 {
            return false;
        }

        if self.flags & ExceptionHandlerFlags::FILTER.bits() != 0
            && self.class_token_or_filter >= self.handler_offset
        {
            return false;
        }

        let try_start = u64::from(self.try_offset);
        let try_end = try_start + u64::from(self.try_length);
        let handler_start = u64::from(self.handler_offset);
        let handler_end = handler_start + u64::from(self.handler_length);

        let disjoint = try_end <= handler_start || handler_end <= try_start;
        let try_inside_handler = try_start >= handler_start && try_end <= handler_end;
        let handler_inside_try = handler_start >= try_start && handler_end <= try_end;

        disjoint || try_inside_handler || handler_inside_try
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(flags: u16, t: (u32, u32), h: (u32, u32), extra: u32) -> RawExceptionClause {
        RawExceptionClause {
            flags,
            try_offset: t.0,
            try_length: t.1,
            handler_offset: h.0,
            handler_length: h.1,
            class_token_or_filter: extra,
        }
    }

    #[test]
    fn zero_lengths_rejected() {
        assert!(!clause(0, (0, 6), (6, 0), 0).is_well_formed());
        assert!(!clause(0, (0, 0), (6, 4), 0).is_well_formed());
        assert!(clause(0, (0, 6), (6, 4), 0).is_well_formed());
    }

    #[test]
    fn filter_must_precede_handler() {
        let filter = ExceptionHandlerFlags::FILTER.bits();
        assert!(clause(filter, (0, 4), (12, 4), 8).is_well_formed());
        assert!(!clause(filter, (0, 4), (12, 4), 12).is_well_formed());
        assert!(!clause(filter, (0, 4), (12, 4), 16).is_well_formed());
    }

    #[test]
    fn partial_overlap_rejected() {
        // handler straddles the end of try
        assert!(!clause(0, (0, 8), (4, 8), 0).is_well_formed());
        // handler fully inside try: allowed
        assert!(clause(0, (0, 12), (4, 4), 0).is_well_formed());
        // try fully inside handler: allowed
        assert!(clause(0, (4, 4), (0, 12), 0).is_well_formed());
        // exact same region: allowed (mutual containment)
        assert!(clause(0, (0, 4), (0, 4), 0).is_well_formed());
    }

    #[test]
    fn kind_predicates() {
        let handler = ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_start: Some(0),
            try_end: Some(2),
            filter_start: None,
            handler_start: Some(2),
            handler_end: None,
            catch_type: None,
        };
        assert!(handler.is_finally());
        assert!(!handler.is_catch());
        assert!(!handler.is_filter());
    }
}
