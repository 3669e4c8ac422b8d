// Managers Module
//
// Focused manager classes applying Single Responsibility Principle.
//
// Each manager handles one specific concern:
// - BroadcastChannelManager: Tokio broadcast channel management

pub mod broadcast_manager;

pub use broadcast_manager::BroadcastChannelManager;
