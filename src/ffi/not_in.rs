/// Exported `not_in*` symbols.
///
/// Register with:
///   CREATE AGGREGATE FUNCTION not_in RETURNS STRING SONAME "libnot_in.so";
/// or, for builds with the `real-result` feature:
///   CREATE AGGREGATE FUNCTION not_in RETURNS REAL SONAME "libnot_in.so";
///
/// The host resolves these by name, so the Rust signatures must match the
/// aggregate-UDF prototypes exactly.
use std::os::raw::c_char;
#[cfg(not(feature = "real-result"))]
use std::os::raw::c_ulong;

use super::udf::{self, UdfArgs, UdfInit};
use crate::aggregate::NotIn;

/// `my_bool not_in_init(UDF_INIT*, UDF_ARGS*, char* message)`
///
/// # Safety
/// Called by the host with its own descriptors and a `MYSQL_ERRMSG_SIZE` buffer.
#[no_mangle]
pub unsafe extern "C" fn not_in_init(
    initid: *mut UdfInit,
    args: *mut UdfArgs,
    message: *mut c_char,
) -> c_char {
    udf::udf_init::<NotIn>(initid, args, message)
}

/// `void not_in_deinit(UDF_INIT*)`
///
/// # Safety
/// Only after a successful `not_in_init` on the same descriptor.
#[no_mangle]
pub unsafe extern "C" fn not_in_deinit(initid: *mut UdfInit) {
    udf::udf_deinit::<NotIn>(initid)
}

/// `void not_in_clear(UDF_INIT*, char* is_null, char* error)`
///
/// # Safety
/// Only after a successful `not_in_init` on the same descriptor.
#[no_mangle]
pub unsafe extern "C" fn not_in_clear(initid: *mut UdfInit, is_null: *mut c_char, error: *mut c_char) {
    udf::udf_clear::<NotIn>(initid, is_null, error)
}

/// `void not_in_add(UDF_INIT*, UDF_ARGS*, char* is_null, char* error)`
///
/// # Safety
/// Only after a successful `not_in_init`; `args` describes the current row.
#[no_mangle]
pub unsafe extern "C" fn not_in_add(
    initid: *mut UdfInit,
    args: *mut UdfArgs,
    is_null: *mut c_char,
    error: *mut c_char,
) {
    udf::udf_add::<NotIn>(initid, args, is_null, error)
}

/// `void not_in_reset(UDF_INIT*, UDF_ARGS*, char* is_null, char* error)`
///
/// Only hosts that predate `xxx_clear` call this.
///
/// # Safety
/// Only after a successful `not_in_init`; `args` describes the current row.
#[no_mangle]
pub unsafe extern "C" fn not_in_reset(
    initid: *mut UdfInit,
    args: *mut UdfArgs,
    is_null: *mut c_char,
    error: *mut c_char,
) {
    udf::udf_reset::<NotIn>(initid, args, is_null, error)
}

/// `char* not_in(UDF_INIT*, UDF_ARGS*, char* result, unsigned long* length, char* is_null, char* error)`
///
/// Hands back the host's own result buffer without touching `length` or `is_null`.
///
/// # Safety
/// Only after a successful `not_in_init` on the same descriptor.
#[cfg(not(feature = "real-result"))]
#[no_mangle]
pub unsafe extern "C" fn not_in(
    initid: *mut UdfInit,
    _args: *mut UdfArgs,
    result: *mut c_char,
    length: *mut c_ulong,
    is_null: *mut c_char,
    error: *mut c_char,
) -> *mut c_char {
    udf::udf_finalize::<NotIn>(initid, result, length, is_null, error)
}

/// `double not_in(UDF_INIT*, UDF_ARGS*, char* is_null, char* error)`
///
/// # Safety
/// Only after a successful `not_in_init` on the same descriptor.
#[cfg(feature = "real-result")]
#[no_mangle]
pub unsafe extern "C" fn not_in(
    initid: *mut UdfInit,
    _args: *mut UdfArgs,
    is_null: *mut c_char,
    error: *mut c_char,
) -> f64 {
    udf::udf_finalize_real::<NotIn>(initid, is_null, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::byte_set::fault;
    use crate::ffi::udf::harness::*;
    use crate::ffi::udf::{INT_RESULT, REAL_RESULT, STRING_RESULT};
    use std::os::raw::c_ulong;

    /// One statement's worth of host-side state for a NOT_IN instance.
    struct Statement {
        init: UdfInit,
        is_null: c_char,
        error: c_char,
    }

    impl Statement {
        fn open(max_len: c_ulong) -> Self {
            let mut meta = HostArgs::metadata(&[INT_RESULT, REAL_RESULT], &[max_len, 3]);
            let mut init = new_init();
            let mut msg = message_buffer();
            let rc = unsafe { not_in_init(&mut init, meta.as_mut_ptr(), msg.as_mut_ptr()) };
            assert_eq!(rc, 0, "init failed: {}", message_text(&msg));
            assert_eq!(meta.arg_type, vec![STRING_RESULT, STRING_RESULT]);
            Statement {
                init,
                is_null: 0,
                error: 0,
            }
        }

        fn clear(&mut self) {
            unsafe { not_in_clear(&mut self.init, &mut self.is_null, &mut self.error) };
        }

        fn add(&mut self, value: Option<&[u8]>, reference: Option<&[u8]>) {
            let mut row = HostArgs::row(&[value, reference]);
            unsafe {
                not_in_add(
                    &mut self.init,
                    row.as_mut_ptr(),
                    &mut self.is_null,
                    &mut self.error,
                )
            };
            row.scribble();
        }

        fn reset(&mut self, value: Option<&[u8]>, reference: Option<&[u8]>) {
            let mut row = HostArgs::row(&[value, reference]);
            unsafe {
                not_in_reset(
                    &mut self.init,
                    row.as_mut_ptr(),
                    &mut self.is_null,
                    &mut self.error,
                )
            };
        }

        fn state(&self) -> &NotIn {
            unsafe { &*(self.init.ptr as *const NotIn) }
        }

        fn close(mut self) {
            unsafe { not_in_deinit(&mut self.init) };
            assert!(self.init.ptr.is_null());
        }
    }

    fn sorted(set: &crate::aggregate::ByteSet) -> Vec<Vec<u8>> {
        set.sorted().into_iter().map(|b| b.to_vec()).collect()
    }

    #[test]
    fn test_init_publishes_value_length() {
        let stmt = Statement::open(42);
        assert_eq!(stmt.init.maybe_null, 1);
        assert_eq!(stmt.init.max_length, 42);
        assert!(stmt.state().values().is_empty());
        assert!(stmt.state().references().is_empty());
        stmt.close();
    }

    #[test]
    fn test_init_wrong_arity() {
        let mut meta = HostArgs::metadata(&[STRING_RESULT], &[10]);
        let mut init = new_init();
        let mut msg = message_buffer();
        let rc = unsafe { not_in_init(&mut init, meta.as_mut_ptr(), msg.as_mut_ptr()) };
        assert_eq!(rc, 1);
        assert_eq!(
            message_text(&msg),
            "wrong number of arguments: NOT_IN() requires 2 arguments"
        );
        assert!(init.ptr.is_null());

        let mut meta = HostArgs::metadata(&[STRING_RESULT; 3], &[1, 1, 1]);
        let rc = unsafe { not_in_init(&mut init, meta.as_mut_ptr(), msg.as_mut_ptr()) };
        assert_eq!(rc, 1);
    }

    #[cfg(not(feature = "real-result"))]
    #[test]
    fn test_groups_through_c_abi() {
        let mut stmt = Statement::open(16);

        // Group 1: rows copied before the host scribbles over its buffers.
        stmt.clear();
        stmt.add(Some(b"a"), Some(b"b"));
        stmt.add(Some(b"b"), Some(b"c"));
        assert_eq!(sorted(stmt.state().values()), vec![b"a".to_vec()]);
        assert_eq!(
            sorted(stmt.state().references()),
            vec![b"b".to_vec(), b"c".to_vec()]
        );

        let mut result = vec![0 as c_char; 255];
        let mut length: c_ulong = 7;
        let out = unsafe {
            not_in(
                &mut stmt.init,
                std::ptr::null_mut(),
                result.as_mut_ptr(),
                &mut length,
                &mut stmt.is_null,
                &mut stmt.error,
            )
        };
        assert_eq!(out, result.as_mut_ptr());
        assert_eq!(length, 7);
        assert_eq!(stmt.is_null, 0);

        // Group 2 starts from nothing.
        stmt.clear();
        assert!(stmt.state().values().is_empty());
        stmt.add(Some(b"b"), None);
        stmt.add(None, Some(b"c"));
        assert_eq!(sorted(stmt.state().values()), vec![b"b".to_vec()]);
        assert_eq!(sorted(stmt.state().references()), vec![b"c".to_vec()]);

        assert_eq!(stmt.error, 0);
        stmt.close();
    }

    #[cfg(feature = "real-result")]
    #[test]
    fn test_real_finalize_returns_sentinel() {
        let mut stmt = Statement::open(16);
        stmt.clear();
        stmt.add(Some(b"a"), Some(b"b"));
        let out = unsafe {
            not_in(
                &mut stmt.init,
                std::ptr::null_mut(),
                &mut stmt.is_null,
                &mut stmt.error,
            )
        };
        assert_eq!(out, 0.0);
        assert_eq!(stmt.is_null, 0);
        assert_eq!(stmt.error, 0);
        stmt.close();
    }

    #[test]
    fn test_reset_is_clear_then_add() {
        let mut stmt = Statement::open(16);
        stmt.clear();
        stmt.add(Some(b"x"), Some(b"y"));
        stmt.reset(Some(b"y"), Some(b"z"));
        assert_eq!(sorted(stmt.state().values()), vec![b"y".to_vec()]);
        assert_eq!(sorted(stmt.state().references()), vec![b"z".to_vec()]);
        stmt.close();
    }

    #[test]
    fn test_self_match_through_c_abi() {
        let mut stmt = Statement::open(16);
        stmt.clear();
        stmt.add(Some(b"a"), Some(b"a"));
        assert!(stmt.state().values().is_empty());
        assert_eq!(sorted(stmt.state().references()), vec![b"a".to_vec()]);
        stmt.close();
    }

    #[test]
    fn test_add_allocation_failure_raises_error_flag() {
        let mut stmt = Statement::open(16);
        stmt.clear();
        stmt.add(Some(b"a"), None);
        assert_eq!(stmt.error, 0);

        fault::fail_allocation_after(0);
        stmt.add(Some(b"x"), Some(b"a"));
        assert_eq!(stmt.error, 1);
        assert!(stmt.state().values().is_empty());
        assert_eq!(sorted(stmt.state().references()), vec![b"a".to_vec()]);

        // The host keeps feeding rows after a failed add.
        stmt.error = 0;
        stmt.add(Some(b"z"), None);
        assert_eq!(stmt.error, 0);
        assert_eq!(sorted(stmt.state().values()), vec![b"z".to_vec()]);
        stmt.close();
    }

    #[test]
    fn test_init_allocation_failure_message() {
        for skip in 0..2 {
            let mut meta = HostArgs::metadata(&[STRING_RESULT, STRING_RESULT], &[8, 8]);
            let mut init = new_init();
            let mut msg = message_buffer();
            fault::fail_allocation_after(skip);
            let rc = unsafe { not_in_init(&mut init, meta.as_mut_ptr(), msg.as_mut_ptr()) };
            assert_eq!(rc, 1);
            assert_eq!(message_text(&msg), "Couldn't allocate memory");
            assert!(init.ptr.is_null());
        }
    }

    #[test]
    fn test_binary_values_keep_length() {
        let mut stmt = Statement::open(16);
        stmt.clear();
        stmt.add(Some(b"ab\0"), Some(b"ab"));
        assert!(stmt.state().contains_value(b"ab\0"));
        assert!(!stmt.state().contains_value(b"ab"));
        stmt.close();
    }
}
