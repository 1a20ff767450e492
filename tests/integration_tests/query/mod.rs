mod mod_geo;
mod mod_render;
