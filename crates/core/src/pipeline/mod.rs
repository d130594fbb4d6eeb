pub mod detect_damage_use_case;
pub(crate) mod frame_step;
pub mod infrastructure;
pub mod pipeline_executor;
pub mod pipeline_logger;
pub mod pipeline_state;
pub mod resource_session;

#[cfg(test)]
pub(crate) mod test_support;
