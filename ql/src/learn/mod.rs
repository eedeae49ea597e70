pub mod dqn_agent;
pub mod replay_buffer;
pub mod trainer;
