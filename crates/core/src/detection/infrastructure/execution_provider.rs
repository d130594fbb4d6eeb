use ort::execution_providers::ExecutionProviderDispatch;

/// Accelerators to register for a detection session.
///
/// ONNX Runtime keeps CPU as the final fallback, so an empty list (or a
/// provider that fails to initialize) still yields a working session.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    let providers = platform_providers();
    log::debug!(
        "Requesting {} accelerated execution provider(s)",
        providers.len()
    );
    providers
}

#[cfg(target_os = "macos")]
fn platform_providers() -> Vec<ExecutionProviderDispatch> {
    use ort::execution_providers::CoreMLExecutionProvider;
    vec![CoreMLExecutionProvider::default().build()]
}

#[cfg(target_os = "windows")]
fn platform_providers() -> Vec<ExecutionProviderDispatch> {
    use ort::execution_providers::DirectMLExecutionProvider;
    vec![DirectMLExecutionProvider::default().build()]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_providers() -> Vec<ExecutionProviderDispatch> {
    Vec::new()
}
