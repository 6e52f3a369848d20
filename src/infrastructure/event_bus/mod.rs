mod in_memory_event_bus;
mod redis_event_bus;

pub use in_memory_event_bus::InMemoryEventBus;
pub use redis_event_bus::RedisEventBus;
