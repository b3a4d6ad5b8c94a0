//! Minimal bindings to the TensorFlow Lite C API, loaded at runtime.
//!
//! The runtime shared library (`libtensorflowlite_c`) is resolved through
//! `libloading` rather than linked at build time, so the binary starts on
//! machines without TFLite installed and only needs the library when an
//! embedding model is actually loaded.

use std::ffi::{CString, c_char, c_int, c_void};
use std::path::Path;

use libloading::Library;
use ndarray::Array2;
use tracing::{debug, info};

use super::{EMBEDDING_DIM, EmbeddingModel};
use crate::error::FadError;

#[repr(C)]
struct TfLiteModel {
    _private: [u8; 0],
}

#[repr(C)]
struct TfLiteInterpreterOptions {
    _private: [u8; 0],
}

#[repr(C)]
struct TfLiteInterpreter {
    _private: [u8; 0],
}

#[repr(C)]
struct TfLiteTensor {
    _private: [u8; 0],
}

const TFLITE_OK: c_int = 0;
const TFLITE_FLOAT32: c_int = 1;

/// Resolved C API entry points. The function pointers are copied out of the
/// library, which stays loaded for as long as this struct lives.
struct TfliteApi {
    model_create_from_file: unsafe extern "C" fn(*const c_char) -> *mut TfLiteModel,
    model_delete: unsafe extern "C" fn(*mut TfLiteModel),
    options_create: unsafe extern "C" fn() -> *mut TfLiteInterpreterOptions,
    options_set_num_threads: unsafe extern "C" fn(*mut TfLiteInterpreterOptions, c_int),
    options_delete: unsafe extern "C" fn(*mut TfLiteInterpreterOptions),
    interpreter_create: unsafe extern "C" fn(
        *const TfLiteModel,
        *const TfLiteInterpreterOptions,
    ) -> *mut TfLiteInterpreter,
    interpreter_delete: unsafe extern "C" fn(*mut TfLiteInterpreter),
    allocate_tensors: unsafe extern "C" fn(*mut TfLiteInterpreter) -> c_int,
    resize_input_tensor:
        unsafe extern "C" fn(*mut TfLiteInterpreter, c_int, *const c_int, c_int) -> c_int,
    get_input_tensor: unsafe extern "C" fn(*mut TfLiteInterpreter, c_int) -> *mut TfLiteTensor,
    invoke: unsafe extern "C" fn(*mut TfLiteInterpreter) -> c_int,
    output_tensor_count: unsafe extern "C" fn(*const TfLiteInterpreter) -> c_int,
    get_output_tensor:
        unsafe extern "C" fn(*const TfLiteInterpreter, c_int) -> *const TfLiteTensor,
    tensor_type: unsafe extern "C" fn(*const TfLiteTensor) -> c_int,
    tensor_num_dims: unsafe extern "C" fn(*const TfLiteTensor) -> c_int,
    tensor_dim: unsafe extern "C" fn(*const TfLiteTensor, c_int) -> c_int,
    tensor_byte_size: unsafe extern "C" fn(*const TfLiteTensor) -> usize,
    tensor_copy_from_buffer: unsafe extern "C" fn(*mut TfLiteTensor, *const c_void, usize) -> c_int,
    tensor_copy_to_buffer: unsafe extern "C" fn(*const TfLiteTensor, *mut c_void, usize) -> c_int,
    _lib: Library,
}

fn resolve<T: Copy>(lib: &Library, name: &[u8]) -> Result<T, FadError> {
    let symbol = unsafe { lib.get::<T>(name) }.map_err(|err| {
        FadError::Model(format!(
            "runtime is missing symbol {}: {err}",
            String::from_utf8_lossy(&name[..name.len() - 1])
        ))
    })?;
    Ok(*symbol)
}

impl TfliteApi {
    fn load(lib_path: &Path) -> Result<Self, FadError> {
        let lib = unsafe { Library::new(lib_path) }.map_err(|err| {
            FadError::Model(format!(
                "failed to load TFLite runtime {}: {err}",
                lib_path.display()
            ))
        })?;
        Ok(Self {
            model_create_from_file: resolve(&lib, b"TfLiteModelCreateFromFile\0")?,
            model_delete: resolve(&lib, b"TfLiteModelDelete\0")?,
            options_create: resolve(&lib, b"TfLiteInterpreterOptionsCreate\0")?,
            options_set_num_threads: resolve(&lib, b"TfLiteInterpreterOptionsSetNumThreads\0")?,
            options_delete: resolve(&lib, b"TfLiteInterpreterOptionsDelete\0")?,
            interpreter_create: resolve(&lib, b"TfLiteInterpreterCreate\0")?,
            interpreter_delete: resolve(&lib, b"TfLiteInterpreterDelete\0")?,
            allocate_tensors: resolve(&lib, b"TfLiteInterpreterAllocateTensors\0")?,
            resize_input_tensor: resolve(&lib, b"TfLiteInterpreterResizeInputTensor\0")?,
            get_input_tensor: resolve(&lib, b"TfLiteInterpreterGetInputTensor\0")?,
            invoke: resolve(&lib, b"TfLiteInterpreterInvoke\0")?,
            output_tensor_count: resolve(&lib, b"TfLiteInterpreterGetOutputTensorCount\0")?,
            get_output_tensor: resolve(&lib, b"TfLiteInterpreterGetOutputTensor\0")?,
            tensor_type: resolve(&lib, b"TfLiteTensorType\0")?,
            tensor_num_dims: resolve(&lib, b"TfLiteTensorNumDims\0")?,
            tensor_dim: resolve(&lib, b"TfLiteTensorDim\0")?,
            tensor_byte_size: resolve(&lib, b"TfLiteTensorByteSize\0")?,
            tensor_copy_from_buffer: resolve(&lib, b"TfLiteTensorCopyFromBuffer\0")?,
            tensor_copy_to_buffer: resolve(&lib, b"TfLiteTensorCopyToBuffer\0")?,
            _lib: lib,
        })
    }
}

/// An embedding model served by the TFLite interpreter.
///
/// The input tensor is resized to each waveform's length before invocation,
/// so clips of any duration run through the same interpreter. The model is
/// expected to expose one float32 output whose trailing dimension is
/// [`EMBEDDING_DIM`]; all leading dimensions are flattened into frames.
pub struct TfliteEmbedder {
    api: TfliteApi,
    model: *mut TfLiteModel,
    options: *mut TfLiteInterpreterOptions,
    interpreter: *mut TfLiteInterpreter,
    input_len: usize,
}

impl TfliteEmbedder {
    pub fn load(model_path: &Path, lib_path: &Path, threads: usize) -> Result<Self, FadError> {
        let api = TfliteApi::load(lib_path)?;
        let model_cpath = model_path
            .to_str()
            .and_then(|path| CString::new(path).ok())
            .ok_or_else(|| {
                FadError::Model(format!(
                    "model path is not a valid C string: {}",
                    model_path.display()
                ))
            })?;

        let model = unsafe { (api.model_create_from_file)(model_cpath.as_ptr()) };
        if model.is_null() {
            return Err(FadError::Model(format!(
                "failed to load model {}",
                model_path.display()
            )));
        }

        let options = unsafe { (api.options_create)() };
        if options.is_null() {
            unsafe { (api.model_delete)(model) };
            return Err(FadError::Model(
                "failed to create interpreter options".to_string(),
            ));
        }
        if threads > 0 {
            unsafe { (api.options_set_num_threads)(options, threads as c_int) };
        }

        let interpreter = unsafe { (api.interpreter_create)(model, options) };
        if interpreter.is_null() {
            unsafe {
                (api.options_delete)(options);
                (api.model_delete)(model);
            }
            return Err(FadError::Model("failed to create interpreter".to_string()));
        }

        if unsafe { (api.allocate_tensors)(interpreter) } != TFLITE_OK {
            unsafe {
                (api.interpreter_delete)(interpreter);
                (api.options_delete)(options);
                (api.model_delete)(model);
            }
            return Err(FadError::Model("tensor allocation failed".to_string()));
        }

        info!("Loaded TFLite model {}", model_path.display());
        Ok(Self {
            api,
            model,
            options,
            interpreter,
            input_len: 0,
        })
    }

    /// Resize the input tensor to `len` samples, keeping the model's rank.
    fn prepare_input(&mut self, len: usize) -> Result<(), FadError> {
        if self.input_len == len {
            return Ok(());
        }
        let input = unsafe { (self.api.get_input_tensor)(self.interpreter, 0) };
        if input.is_null() {
            return Err(FadError::Model("model has no input tensor".to_string()));
        }
        let dims: Vec<c_int> = match unsafe { (self.api.tensor_num_dims)(input) } {
            1 => vec![len as c_int],
            2 => vec![1, len as c_int],
            rank => {
                return Err(FadError::Model(format!(
                    "unsupported input tensor rank {rank}"
                )));
            }
        };
        debug!("Resizing model input to {len} samples");
        let status = unsafe {
            (self.api.resize_input_tensor)(
                self.interpreter,
                0,
                dims.as_ptr(),
                dims.len() as c_int,
            )
        };
        if status != TFLITE_OK {
            return Err(FadError::Model(format!(
                "input resize to {len} samples failed"
            )));
        }
        if unsafe { (self.api.allocate_tensors)(self.interpreter) } != TFLITE_OK {
            return Err(FadError::Model(
                "tensor allocation after resize failed".to_string(),
            ));
        }
        self.input_len = len;
        Ok(())
    }

    fn read_output(&self) -> Result<Array2<f32>, FadError> {
        let count = unsafe { (self.api.output_tensor_count)(self.interpreter) };
        for index in 0..count {
            let tensor = unsafe { (self.api.get_output_tensor)(self.interpreter, index) };
            if tensor.is_null() || unsafe { (self.api.tensor_type)(tensor) } != TFLITE_FLOAT32 {
                continue;
            }
            let rank = unsafe { (self.api.tensor_num_dims)(tensor) };
            if rank < 1 || unsafe { (self.api.tensor_dim)(tensor, rank - 1) } != EMBEDDING_DIM as c_int
            {
                continue;
            }
            let total = unsafe { (self.api.tensor_byte_size)(tensor) } / size_of::<f32>();
            if total % EMBEDDING_DIM != 0 {
                return Err(FadError::Model(format!(
                    "output tensor holds {total} floats, not a whole number of embedding rows"
                )));
            }
            let mut data = vec![0.0_f32; total];
            let status = unsafe {
                (self.api.tensor_copy_to_buffer)(
                    tensor,
                    data.as_mut_ptr().cast::<c_void>(),
                    total * size_of::<f32>(),
                )
            };
            if status != TFLITE_OK {
                return Err(FadError::Model("output tensor copy failed".to_string()));
            }
            return Array2::from_shape_vec((total / EMBEDDING_DIM, EMBEDDING_DIM), data)
                .map_err(|err| FadError::Model(format!("output reshape failed: {err}")));
        }
        Err(FadError::Model(format!(
            "model exposes no float32 output with a {EMBEDDING_DIM}-wide trailing dimension"
        )))
    }
}

impl EmbeddingModel for TfliteEmbedder {
    fn embed(&mut self, waveform: &[f32]) -> Result<Array2<f32>, FadError> {
        if waveform.is_empty() {
            return Err(FadError::Model("cannot embed an empty waveform".to_string()));
        }
        self.prepare_input(waveform.len())?;

        // Allocation can relocate tensors, so fetch the input pointer fresh.
        let input = unsafe { (self.api.get_input_tensor)(self.interpreter, 0) };
        if input.is_null() {
            return Err(FadError::Model("model has no input tensor".to_string()));
        }
        if unsafe { (self.api.tensor_type)(input) } != TFLITE_FLOAT32 {
            return Err(FadError::Model("input tensor is not float32".to_string()));
        }
        let expected_bytes = waveform.len() * size_of::<f32>();
        let actual_bytes = unsafe { (self.api.tensor_byte_size)(input) };
        if actual_bytes != expected_bytes {
            return Err(FadError::Model(format!(
                "input tensor holds {actual_bytes} bytes, waveform needs {expected_bytes}"
            )));
        }
        let status = unsafe {
            (self.api.tensor_copy_from_buffer)(
                input,
                waveform.as_ptr().cast::<c_void>(),
                expected_bytes,
            )
        };
        if status != TFLITE_OK {
            return Err(FadError::Model("input tensor copy failed".to_string()));
        }

        if unsafe { (self.api.invoke)(self.interpreter) } != TFLITE_OK {
            return Err(FadError::Model("inference failed".to_string()));
        }
        self.read_output()
    }
}

impl Drop for TfliteEmbedder {
    fn drop(&mut self) {
        unsafe {
            if !self.interpreter.is_null() {
                (self.api.interpreter_delete)(self.interpreter);
            }
            if !self.options.is_null() {
                (self.api.options_delete)(self.options);
            }
            if !self.model.is_null() {
                (self.api.model_delete)(self.model);
            }
        }
    }
}
