/// Aggregate-UDF C ABI: host structures and generic lifecycle shims.
///
/// The host (mysqld / mariadbd) loads the library, resolves `<name>_init`,
/// `<name>_deinit`, `<name>_clear`, `<name>_add`, `<name>_reset` and `<name>`
/// by symbol, and calls them with the structures mirrored below. The shims in
/// this module are written once against [`UdfAggregate`]; the exported symbols
/// in `ffi::not_in` are one-line wrappers around them.
///
/// All instance state hangs off `UDF_INIT::ptr`. Nothing here keeps global
/// state, and no unwind is allowed to cross back into the host.
use std::os::raw::{c_char, c_int, c_uint, c_ulong, c_void};
use std::panic;
use std::ptr;
use std::slice;

use crate::aggregate::{Finalized, UdfAggregate};
use crate::error::{Result, UdfError};

// ─────────────────────── ABI constants ───────────────────────

/// Capacity of the host's init message buffer.
pub const MYSQL_ERRMSG_SIZE: usize = 512;
/// Longest message the host is guaranteed to display untruncated.
pub const MAX_MESSAGE_LEN: usize = 80;

/// `enum Item_result` as the host passes it. Kept as a plain integer so an
/// unknown tag coming from the host is not undefined behavior.
pub type ItemResult = c_int;
pub const STRING_RESULT: ItemResult = 0;
pub const REAL_RESULT: ItemResult = 1;
pub const INT_RESULT: ItemResult = 2;

// ─────────────────────── Host structures ───────────────────────

/// `UDF_INIT`: per-instance descriptor, re-presented on every call.
#[repr(C)]
#[derive(Debug)]
pub struct UdfInit {
    pub maybe_null: c_char,
    pub decimals: c_uint,
    pub max_length: c_ulong,
    pub ptr: *mut c_char,
    pub const_item: c_char,
    pub extension: *mut c_void,
}

/// `UDF_ARGS`: argument metadata at init, argument values on each row.
#[repr(C)]
#[derive(Debug)]
pub struct UdfArgs {
    pub arg_count: c_uint,
    pub arg_type: *mut ItemResult,
    pub args: *mut *mut c_char,
    pub lengths: *mut c_ulong,
    pub maybe_null: *mut c_char,
    pub attributes: *mut *mut c_char,
    pub attribute_lengths: *mut c_ulong,
    pub extension: *mut c_void,
}

// ─────────────────────── Safe views ───────────────────────

/// Init-time view of `UDF_ARGS`.
pub struct ArgMetadata<'a> {
    args: &'a mut UdfArgs,
}

impl<'a> ArgMetadata<'a> {
    /// # Safety
    /// `args` must be null or point to a `UDF_ARGS` whose arrays hold
    /// `arg_count` entries each (or are null), valid for `'a`.
    pub unsafe fn from_raw(args: *mut UdfArgs) -> Option<Self> {
        args.as_mut().map(|args| ArgMetadata { args })
    }

    pub fn arg_count(&self) -> usize {
        self.args.arg_count as usize
    }

    /// Ask the host to coerce every argument to a byte string.
    pub fn coerce_all_to_string(&mut self) {
        if self.args.arg_type.is_null() {
            return;
        }
        for i in 0..self.arg_count() {
            unsafe { *self.args.arg_type.add(i) = STRING_RESULT };
        }
    }

    pub fn arg_type(&self, idx: usize) -> Option<ItemResult> {
        if idx >= self.arg_count() || self.args.arg_type.is_null() {
            return None;
        }
        Some(unsafe { *self.args.arg_type.add(idx) })
    }

    /// Host-advertised maximum length of argument `idx` (0 if unknown).
    pub fn max_length(&self, idx: usize) -> c_ulong {
        if idx >= self.arg_count() || self.args.lengths.is_null() {
            return 0;
        }
        unsafe { *self.args.lengths.add(idx) }
    }
}

/// Row-time view of `UDF_ARGS`. Borrowed bytes are only valid for the
/// current call; anything kept must be copied.
pub struct Row<'a> {
    args: &'a UdfArgs,
}

impl<'a> Row<'a> {
    /// # Safety
    /// `args` must be null or point to a `UDF_ARGS` whose `args`/`lengths`
    /// arrays hold `arg_count` entries, each non-null argument pointer
    /// addressing at least `lengths[i]` readable bytes, all valid for `'a`.
    pub unsafe fn from_raw(args: *const UdfArgs) -> Option<Self> {
        args.as_ref().map(|args| Row { args })
    }

    pub fn len(&self) -> usize {
        self.args.arg_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Argument `idx` as bytes, or `None` for SQL NULL / missing slot.
    pub fn get(&self, idx: usize) -> Option<&'a [u8]> {
        if idx >= self.len() || self.args.args.is_null() {
            return None;
        }
        let data = unsafe { *self.args.args.add(idx) };
        if data.is_null() {
            return None;
        }
        let len = if self.args.lengths.is_null() {
            0
        } else {
            unsafe { *self.args.lengths.add(idx) as usize }
        };
        Some(unsafe { slice::from_raw_parts(data as *const u8, len) })
    }
}

// ─────────────────────── Helpers ───────────────────────

/// Run `$code`, converting a panic into `$on_panic` so it never unwinds into C.
macro_rules! catch_panic {
    ($name:expr, $code:expr, $on_panic:expr) => {
        match panic::catch_unwind(panic::AssertUnwindSafe(|| $code)) {
            Ok(result) => result,
            Err(_) => {
                log::error!("{}: Rust panic caught at the C boundary", $name);
                $on_panic
            }
        }
    };
}

/// Copy `text` into the host message buffer, NUL-terminated and truncated to fit.
///
/// # Safety
/// `message` must be null or point to `MYSQL_ERRMSG_SIZE` writable bytes.
pub unsafe fn write_message(message: *mut c_char, text: &str) {
    if message.is_null() {
        return;
    }
    let bytes = text.as_bytes();
    let n = bytes.len().min(MYSQL_ERRMSG_SIZE - 1);
    ptr::copy_nonoverlapping(bytes.as_ptr(), message as *mut u8, n);
    *message.add(n) = 0;
}

/// Log a shim failure at the level its kind calls for.
fn log_failure(name: &str, stage: &str, err: &UdfError) {
    log::log!(err.kind().log_level(), "{} {} failed: {}", name, stage, err);
}

unsafe fn set_flag(flag: *mut c_char) {
    if !flag.is_null() {
        *flag = 1;
    }
}

unsafe fn state_mut<'a, A: UdfAggregate>(initid: *mut UdfInit) -> Option<&'a mut A> {
    let init = initid.as_mut()?;
    (init.ptr as *mut A).as_mut()
}

unsafe fn try_init<A: UdfAggregate>(initid: *mut UdfInit, args: *mut UdfArgs) -> Result<()> {
    let init = initid.as_mut().ok_or(UdfError::Internal(A::NAME))?;
    let mut meta = ArgMetadata::from_raw(args).ok_or(UdfError::Internal(A::NAME))?;

    if meta.arg_count() != A::ARG_COUNT {
        log::debug!(
            "{} called with {} arguments",
            A::NAME,
            meta.arg_count()
        );
        return Err(UdfError::WrongArgumentCount {
            name: A::NAME,
            expected: A::ARG_COUNT,
        });
    }

    let (state, shape) = A::init(&mut meta)?;

    init.maybe_null = c_char::from(shape.maybe_null);
    init.max_length = shape.max_length;
    init.ptr = Box::into_raw(Box::new(state)) as *mut c_char;

    log::debug!(
        "{} initialized (maybe_null={}, max_length={})",
        A::NAME,
        shape.maybe_null,
        shape.max_length
    );
    Ok(())
}

// ─────────────────────── Lifecycle shims ───────────────────────

/// `xxx_init`. Returns 1 on failure with a message in `message`.
///
/// # Safety
/// Pointers must be the host-provided `UDF_INIT`, `UDF_ARGS` and message buffer.
pub unsafe fn udf_init<A: UdfAggregate>(
    initid: *mut UdfInit,
    args: *mut UdfArgs,
    message: *mut c_char,
) -> c_char {
    catch_panic!(
        A::NAME,
        match try_init::<A>(initid, args) {
            Ok(()) => 0,
            Err(e) => {
                log_failure(A::NAME, "init", &e);
                let text = e.to_string();
                debug_assert!(text.len() <= MAX_MESSAGE_LEN, "init message too long: {}", text);
                write_message(message, &text);
                1
            }
        },
        {
            write_message(message, &UdfError::Internal(A::NAME).to_string());
            1
        }
    )
}

/// `xxx_deinit`. Drops the instance state.
///
/// # Safety
/// `initid` must be the descriptor passed to a successful `udf_init::<A>`.
pub unsafe fn udf_deinit<A: UdfAggregate>(initid: *mut UdfInit) {
    catch_panic!(
        A::NAME,
        {
            if let Some(init) = initid.as_mut() {
                if !init.ptr.is_null() {
                    drop(Box::from_raw(init.ptr as *mut A));
                    init.ptr = ptr::null_mut();
                    log::debug!("{} deinitialized", A::NAME);
                }
            }
        },
        ()
    )
}

/// `xxx_clear`. Starts a new group.
///
/// # Safety
/// `initid` must come from a successful `udf_init::<A>`; flags may be null.
pub unsafe fn udf_clear<A: UdfAggregate>(
    initid: *mut UdfInit,
    _is_null: *mut c_char,
    error: *mut c_char,
) {
    catch_panic!(
        A::NAME,
        match state_mut::<A>(initid) {
            Some(state) => state.clear(),
            None => {
                log::error!("{} clear called without state", A::NAME);
                set_flag(error);
            }
        },
        set_flag(error)
    )
}

/// `xxx_add`. Failures are row-local: the `error` flag is raised and the
/// host may keep calling.
///
/// # Safety
/// `initid` must come from a successful `udf_init::<A>`; `args` must describe
/// the current row.
pub unsafe fn udf_add<A: UdfAggregate>(
    initid: *mut UdfInit,
    args: *mut UdfArgs,
    _is_null: *mut c_char,
    error: *mut c_char,
) {
    catch_panic!(
        A::NAME,
        {
            let (Some(state), Some(row)) = (state_mut::<A>(initid), Row::from_raw(args)) else {
                log::error!("{} add called without state or arguments", A::NAME);
                set_flag(error);
                return;
            };
            if let Err(e) = state.add(&row) {
                log_failure(A::NAME, "add", &e);
                set_flag(error);
            }
        },
        set_flag(error)
    )
}

/// `xxx_reset`. Legacy combined clear + add for hosts without `xxx_clear`.
///
/// # Safety
/// Same as [`udf_add`].
pub unsafe fn udf_reset<A: UdfAggregate>(
    initid: *mut UdfInit,
    args: *mut UdfArgs,
    is_null: *mut c_char,
    error: *mut c_char,
) {
    udf_clear::<A>(initid, is_null, error);
    udf_add::<A>(initid, args, is_null, error);
}

/// `xxx` for functions registered `RETURNS STRING`.
///
/// # Safety
/// `initid` must come from a successful `udf_init::<A>`; `result` is the
/// host's result buffer and `length`, `is_null`, `error` its out-parameters.
pub unsafe fn udf_finalize<A: UdfAggregate>(
    initid: *mut UdfInit,
    result: *mut c_char,
    length: *mut c_ulong,
    is_null: *mut c_char,
    error: *mut c_char,
) -> *mut c_char {
    catch_panic!(
        A::NAME,
        {
            let Some(state) = state_mut::<A>(initid) else {
                set_flag(error);
                return ptr::null_mut();
            };
            match state.finalize() {
                Finalized::Untouched => result,
                Finalized::Null => {
                    set_flag(is_null);
                    ptr::null_mut()
                }
                Finalized::Bytes(bytes) => {
                    if !length.is_null() {
                        *length = bytes.len() as c_ulong;
                    }
                    bytes.as_ptr() as *mut c_char
                }
            }
        },
        {
            set_flag(error);
            ptr::null_mut()
        }
    )
}

/// `xxx` for functions registered `RETURNS REAL`: always the `0.0` sentinel
/// unless the aggregate reports NULL.
///
/// # Safety
/// `initid` must come from a successful `udf_init::<A>`.
pub unsafe fn udf_finalize_real<A: UdfAggregate>(
    initid: *mut UdfInit,
    is_null: *mut c_char,
    error: *mut c_char,
) -> f64 {
    catch_panic!(
        A::NAME,
        {
            match state_mut::<A>(initid) {
                Some(state) => {
                    if state.finalize() == Finalized::Null {
                        set_flag(is_null);
                    }
                }
                None => set_flag(error),
            }
            0.0
        },
        {
            set_flag(error);
            0.0
        }
    )
}

// ─────────────────────── Test harness ───────────────────────
