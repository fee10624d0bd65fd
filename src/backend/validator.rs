//! Final validation of the encoded module.
//!
//! Runs wasmparser's full validator over the finished bytes before they
//! leave the backend. A failure here is a bug in this pass, not in the
//! program image, but it must still abort the build: a module that does
//! not validate will not load anywhere.

use crate::errors::CompileError;

pub fn validate_module_bytes(wasm_bytes: &[u8], context: &str) -> Result<(), CompileError> {
    match wasmparser::validate(wasm_bytes) {
        Ok(_) => Ok(()),
        Err(e) => Err(CompileError::wasm_validation(format!(
            "{context} failed validation: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_trivial_module() {
        let bytes = wasm_encoder::Module::new().finish();
        assert!(validate_module_bytes(&bytes, "empty module").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        let err = validate_module_bytes(&[0xDE, 0xAD], "garbage").unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::WasmValidation);
        assert!(err.msg.contains("garbage"));
    }
}
