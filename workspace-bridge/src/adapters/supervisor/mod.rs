pub mod grpc;

pub use grpc::GrpcSupervisor;
