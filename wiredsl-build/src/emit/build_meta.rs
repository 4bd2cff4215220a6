//! Build-manifest emitter: the `CMakeLists.txt` describing the generated
//! protocol library and its dependency on the `wirekit` runtime.

use wiredsl::Result;

use crate::generator::{Generator, MIN_WIREKIT_VERSION};
use crate::template::{self, ReplacementMap};

const TEMPL: &str = "\
cmake_minimum_required (VERSION 3.10)
project (\"#^#NAME#$#\")

option (OPT_REQUIRE_WIREKIT_LIB \"Require the wirekit library, find it and set as dependency of the protocol library\" ON)

include(GNUInstallDirs)

add_library(#^#NAME#$# INTERFACE)

target_include_directories(#^#NAME#$# INTERFACE
    $<INSTALL_INTERFACE:include>
    $<BUILD_INTERFACE:${CMAKE_CURRENT_SOURCE_DIR}/include>
)

if (OPT_REQUIRE_WIREKIT_LIB)
    find_package(LibWirekit #^#MIN_WIREKIT#$# REQUIRED)
    target_link_libraries(#^#NAME#$# INTERFACE cc::wirekit)
endif ()

install(TARGETS #^#NAME#$# EXPORT #^#NAME#$#Config)
install(EXPORT #^#NAME#$#Config
    DESTINATION ${CMAKE_INSTALL_LIBDIR}/#^#NAME#$#/cmake
)

install (
    DIRECTORY ${CMAKE_CURRENT_SOURCE_DIR}/include/
    DESTINATION ${CMAKE_INSTALL_INCLUDEDIR}
)

file (READ \"${PROJECT_SOURCE_DIR}/include/#^#NAME#$#/Version.h\" version_file)
string (REGEX MATCH \"#^#CAP_NAME#$#_MAJOR_VERSION[^0-9]*([0-9]*)U*\" _ ${version_file})
set (major_ver ${CMAKE_MATCH_1})
string (REGEX MATCH \"#^#CAP_NAME#$#_MINOR_VERSION[^0-9]*([0-9]*)U*\" _ ${version_file})
set (minor_ver ${CMAKE_MATCH_1})
string (REGEX MATCH \"#^#CAP_NAME#$#_PATCH_VERSION[^0-9]*([0-9]*)U*\" _ ${version_file})
set (patch_ver ${CMAKE_MATCH_1})
if ((NOT \"${major_ver}\" STREQUAL \"\") AND
    (NOT \"${minor_ver}\" STREQUAL \"\") AND
    (NOT \"${patch_ver}\" STREQUAL \"\"))
    set (#^#CAP_NAME#$#_VERSION \"${major_ver}.${minor_ver}.${patch_ver}\")
    message (STATUS \"Detected version ${#^#CAP_NAME#$#_VERSION} of the protocol library.\")
    include(CMakePackageConfigHelpers)
    write_basic_package_version_file(
        ${CMAKE_BINARY_DIR}/#^#NAME#$#ConfigVersion.cmake
        VERSION ${#^#CAP_NAME#$#_VERSION}
        COMPATIBILITY AnyNewerVersion)
    install (
        FILES ${CMAKE_BINARY_DIR}/#^#NAME#$#ConfigVersion.cmake
        DESTINATION ${CMAKE_INSTALL_LIBDIR}/#^#NAME#$#/cmake/)
endif ()
";

pub(crate) fn write(generator: &Generator<'_>) -> Result<()> {
    let mut repl = ReplacementMap::new();
    repl.insert("NAME", generator.main_namespace().to_string());
    repl.insert("CAP_NAME", generator.main_namespace().to_uppercase());
    repl.insert("MIN_WIREKIT", MIN_WIREKIT_VERSION.to_string());

    generator
        .output()
        .write("CMakeLists.txt", &template::process_template(TEMPL, &repl))
}
