#![no_main]
use libfuzzer_sys::fuzz_target;
use arbitrary::Arbitrary;
use std::os::raw::{c_char, c_uint, c_ulong};
use std::ptr;

use not_in::ffi::udf::{UdfArgs, UdfInit, MYSQL_ERRMSG_SIZE, STRING_RESULT};
use not_in::ffi::{not_in_add, not_in_clear, not_in_deinit, not_in_init, not_in_reset};
use not_in::NotIn;

/// Fuzz the exported C ABI with arbitrary host call sequences.
///
/// Tests:
/// - init rejects every arity except 2 and leaves no state behind
/// - clear / add / reset / finalize in any order never raise `error`
/// - finalize returns the host result buffer and leaves `length` alone
/// - state survives the host scribbling over its argument buffers
/// - deinit releases the instance

#[derive(Arbitrary, Debug)]
enum Call {
    Clear,
    Add(Option<Vec<u8>>, Option<Vec<u8>>),
    Reset(Option<Vec<u8>>, Option<Vec<u8>>),
    Finalize,
}

#[derive(Arbitrary, Debug)]
struct LifecycleInput {
    arg_count: u8,
    value_max_length: u32,
    calls: Vec<Call>,
}

/// Host-side buffers backing one `UDF_ARGS`.
struct HostRow {
    arg_type: Vec<i32>,
    lengths: Vec<c_ulong>,
    buffers: Vec<Option<Vec<u8>>>,
    pointers: Vec<*mut c_char>,
}

impl HostRow {
    fn new(cells: Vec<Option<Vec<u8>>>, lengths: Vec<c_ulong>) -> Self {
        let mut row = HostRow {
            arg_type: vec![STRING_RESULT; cells.len()],
            lengths,
            buffers: cells,
            pointers: Vec::new(),
        };
        row.pointers = row
            .buffers
            .iter_mut()
            .map(|b| match b {
                Some(buf) => buf.as_mut_ptr() as *mut c_char,
                None => ptr::null_mut(),
            })
            .collect();
        row
    }

    fn raw(&mut self) -> UdfArgs {
        UdfArgs {
            arg_count: self.buffers.len() as c_uint,
            arg_type: self.arg_type.as_mut_ptr(),
            args: self.pointers.as_mut_ptr(),
            lengths: self.lengths.as_mut_ptr(),
            maybe_null: ptr::null_mut(),
            attributes: ptr::null_mut(),
            attribute_lengths: ptr::null_mut(),
            extension: ptr::null_mut(),
        }
    }

    fn scribble(&mut self) {
        for buf in self.buffers.iter_mut().flatten() {
            buf.iter_mut().for_each(|b| *b = !*b);
        }
    }
}

fn new_init() -> UdfInit {
    UdfInit {
        maybe_null: 0,
        decimals: 0,
        max_length: 0,
        ptr: ptr::null_mut(),
        const_item: 0,
        extension: ptr::null_mut(),
    }
}

unsafe fn add_like(
    f: unsafe extern "C" fn(*mut UdfInit, *mut UdfArgs, *mut c_char, *mut c_char),
    init: &mut UdfInit,
    v: Option<Vec<u8>>,
    r: Option<Vec<u8>>,
    error: &mut c_char,
) {
    let lengths = vec![
        v.as_ref().map_or(0, |b| b.len() as c_ulong),
        r.as_ref().map_or(0, |b| b.len() as c_ulong),
    ];
    let mut row = HostRow::new(vec![v, r], lengths);
    let mut args = row.raw();
    let mut is_null: c_char = 0;
    f(init, &mut args, &mut is_null, error);
    row.scribble();
}

fuzz_target!(|input: LifecycleInput| {
    if input.calls.len() > 128 {
        return;
    }

    let arg_count = (input.arg_count % 4) as usize;
    let mut meta = HostRow::new(
        vec![None; arg_count],
        vec![input.value_max_length as c_ulong; arg_count],
    );
    let mut meta_args = meta.raw();
    let mut init = new_init();
    let mut message = vec![0 as c_char; MYSQL_ERRMSG_SIZE];

    let rc = unsafe { not_in_init(&mut init, &mut meta_args, message.as_mut_ptr()) };
    if arg_count != 2 {
        assert_eq!(rc, 1);
        assert!(init.ptr.is_null());
        assert!(message.contains(&0));
        return;
    }
    assert_eq!(rc, 0);
    assert_eq!(init.max_length, input.value_max_length as c_ulong);

    let mut error: c_char = 0;
    for call in input.calls {
        match call {
            Call::Clear => {
                let mut is_null: c_char = 0;
                unsafe { not_in_clear(&mut init, &mut is_null, &mut error) };
                let state = unsafe { &*(init.ptr as *const NotIn) };
                assert!(state.values().is_empty() && state.references().is_empty());
            }
            Call::Add(v, r) => {
                if v.as_ref().map_or(0, Vec::len) > 64 || r.as_ref().map_or(0, Vec::len) > 64 {
                    continue;
                }
                let r_copy = r.clone();
                unsafe { add_like(not_in_add, &mut init, v, r, &mut error) };
                let state = unsafe { &*(init.ptr as *const NotIn) };
                if let Some(r) = &r_copy {
                    assert!(state.contains_reference(r));
                    assert!(!state.contains_value(r));
                }
            }
            Call::Reset(v, r) => {
                if v.as_ref().map_or(0, Vec::len) > 64 || r.as_ref().map_or(0, Vec::len) > 64 {
                    continue;
                }
                let expect_value = match (&v, &r) {
                    (Some(v), Some(r)) => v != r,
                    (Some(_), None) => true,
                    _ => false,
                };
                let v_copy = v.clone();
                unsafe { add_like(not_in_reset, &mut init, v, r, &mut error) };
                let state = unsafe { &*(init.ptr as *const NotIn) };
                if let Some(v) = &v_copy {
                    assert_eq!(state.contains_value(v), expect_value);
                }
            }
            Call::Finalize => {
                let mut result = vec![0 as c_char; 255];
                let mut length: c_ulong = 255;
                let mut is_null: c_char = 0;
                let out = unsafe {
                    not_in::ffi::not_in(
                        &mut init,
                        ptr::null_mut(),
                        result.as_mut_ptr(),
                        &mut length,
                        &mut is_null,
                        &mut error,
                    )
                };
                assert_eq!(out, result.as_mut_ptr());
                assert_eq!(length, 255);
                assert_eq!(is_null, 0);
            }
        }
        assert_eq!(error, 0);
    }

    unsafe { not_in_deinit(&mut init) };
    assert!(init.ptr.is_null());
});
