// Reusable schema building blocks shared by component definitions

use crate::cv;
use crate::schema::Schema;
use crate::symbols::IdType;

pub static COMPONENT: IdType = IdType::new("component", "Component", &[]);
pub static POLLING_COMPONENT: IdType = IdType {
    name: "polling_component",
    class: "PollingComponent",
    parents: &[&COMPONENT],
};

pub static I2C_BUS: IdType = IdType::new("i2c_bus", "i2c::I2CBus", &[]);
pub static SPI_BUS: IdType = IdType::new("spi_bus", "spi::SPIComponent", &[]);
pub static UART_BUS: IdType = IdType {
    name: "uart_bus",
    class: "uart::UARTComponent",
    parents: &[&COMPONENT],
};

/// Options every component accepts
pub fn component_schema() -> Schema {
    Schema::new().optional("setup_priority", cv::float_any())
}

/// Component polled on an interval
pub fn polling_component_schema(default_interval: &str) -> Schema {
    Schema::new()
        .optional("setup_priority", cv::float_any())
        .optional_default("update_interval", cv::update_interval(), default_interval)
}

/// Options of user-visible entities (sensors, switches, lights)
pub fn entity_schema() -> Schema {
    Schema::new()
        .optional("name", cv::string())
        .optional_default("internal", cv::boolean(), false)
        .optional_default("disabled_by_default", cv::boolean(), false)
        .optional("icon", cv::string_strict())
}

/// Device on an I2C bus; without a default the address is required
pub fn i2c_device_schema(default_address: Option<i64>) -> Schema {
    let schema = Schema::new().generate_id("i2c_id", cv::use_id(&I2C_BUS));
    match default_address {
        Some(address) => schema.optional_default("address", cv::i2c_address(), address),
        None => schema.required("address", cv::i2c_address()),
    }
}

/// Device on an SPI bus selected by a chip-select pin
pub fn spi_device_schema(cs_required: bool) -> Schema {
    let schema = Schema::new().generate_id("spi_id", cv::use_id(&SPI_BUS));
    if cs_required {
        schema.required("cs_pin", cv::pin())
    } else {
        schema.optional("cs_pin", cv::pin())
    }
}

/// Device attached to a UART
pub fn uart_device_schema() -> Schema {
    Schema::new().generate_id("uart_id", cv::use_id(&UART_BUS))
}
